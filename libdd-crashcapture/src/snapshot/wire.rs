// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Field-by-field fixed-width encoding.
//!
//! Values are written in host byte order with no padding; pointer-sized integers are widened to
//! 64 bits. The reader byte-swaps when the snapshot header says the writer had the other
//! endianness. Decoding never trusts counts: they are clamped to the capacity they index.

use super::DecodeError;
use crate::event::{
    AppInfo, Breadcrumb, BreadcrumbMetadata, BreadcrumbType, DeviceInfo, ErrorInfo,
    MetadataEntry, MetadataTable, MetadataValue, Notifier, Ring, Severity, StackFrame, UserInfo,
    CPU_ABI_MAX, FRAMES_MAX,
};
use crate::sigsafe::{FixedStr, Sink, SnapshotError};
use num_traits::{FromPrimitive, ToPrimitive};

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    swap: bool,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8], swap: bool) -> Self {
        Self { bytes, swap }
    }

    pub(crate) fn set_swap(&mut self, swap: bool) {
        self.swap = swap;
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes as stored, never swapped.
    pub(crate) fn raw(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.bytes.len() < len {
            return Err(DecodeError::Truncated);
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    /// A scalar's bytes, reordered into host order.
    pub(crate) fn scalar<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.raw(N)?);
        if self.swap {
            bytes.reverse();
        }
        Ok(bytes)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        self.scalar().map(u32::from_ne_bytes)
    }
}

pub(crate) trait Wire {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError>;
    /// Overwrites `self` with the next value from `reader`.
    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError>;
}

/// Implements [Wire] for a struct by coding the listed fields in order.
macro_rules! wire_struct {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::snapshot::wire::Wire for $ty {
            fn encode<S: $crate::sigsafe::Sink>(
                &self,
                sink: &mut S,
            ) -> Result<(), $crate::sigsafe::SnapshotError> {
                $( $crate::snapshot::wire::Wire::encode(&self.$field, sink)?; )*
                Ok(())
            }

            fn decode_into(
                &mut self,
                reader: &mut $crate::snapshot::wire::Reader<'_>,
            ) -> Result<(), $crate::snapshot::DecodeError> {
                $( $crate::snapshot::wire::Wire::decode_into(&mut self.$field, reader)?; )*
                Ok(())
            }
        }
    };
}
pub(crate) use wire_struct;

macro_rules! wire_scalar {
    ($($ty:ty),*) => {$(
        impl Wire for $ty {
            fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
                sink.put(&self.to_ne_bytes())
            }

            fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
                *self = <$ty>::from_ne_bytes(reader.scalar()?);
                Ok(())
            }
        }
    )*};
}
wire_scalar!(i32, u32, i64, u64, f64);

impl Wire for usize {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        (*self as u64).encode(sink)
    }

    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
        let mut wide = 0u64;
        wide.decode_into(reader)?;
        *self = usize::try_from(wide).unwrap_or(usize::MAX);
        Ok(())
    }
}

impl Wire for bool {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        sink.put(&[u8::from(*self)])
    }

    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
        *self = reader.raw(1)?[0] != 0;
        Ok(())
    }
}

impl<const N: usize> Wire for FixedStr<N> {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        sink.put(self.raw())
    }

    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
        self.load_raw(reader.raw(N)?);
        Ok(())
    }
}

impl<T: Wire, const N: usize> Wire for [T; N] {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        self.iter().try_for_each(|item| item.encode(sink))
    }

    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
        self.iter_mut().try_for_each(|item| item.decode_into(reader))
    }
}

macro_rules! wire_enum {
    ($ty:ty) => {
        impl Wire for $ty {
            fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
                self.to_i32().unwrap_or_default().encode(sink)
            }

            /// Unknown tags decode to the default variant.
            fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
                let mut tag = 0i32;
                tag.decode_into(reader)?;
                *self = <$ty>::from_i32(tag).unwrap_or_default();
                Ok(())
            }
        }
    };
}
wire_enum!(Severity);
wire_enum!(BreadcrumbType);

impl<T: Wire + Copy + Default, const N: usize> Wire for Ring<T, N> {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        let (count, first_index, slots) = self.raw_parts();
        count.encode(sink)?;
        first_index.encode(sink)?;
        slots.encode(sink)
    }

    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
        let (count, first_index, slots) = self.raw_parts_mut();
        count.decode_into(reader)?;
        first_index.decode_into(reader)?;
        slots.decode_into(reader)?;
        self.normalize();
        Ok(())
    }
}

/// Stored as a tag followed by every payload slot, so the width does not depend on the kind.
impl Wire for MetadataValue {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        let (flag, text, number) = match self {
            MetadataValue::None => (false, FixedStr::new(), 0.0),
            MetadataValue::Bool(flag) => (*flag, FixedStr::new(), 0.0),
            MetadataValue::Text(text) => (false, *text, 0.0),
            MetadataValue::Number(number) => (false, FixedStr::new(), *number),
        };
        self.tag().encode(sink)?;
        flag.encode(sink)?;
        text.encode(sink)?;
        number.encode(sink)
    }

    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
        let mut tag = 0i32;
        let mut flag = false;
        let mut text = FixedStr::new();
        let mut number = 0f64;
        tag.decode_into(reader)?;
        flag.decode_into(reader)?;
        text.decode_into(reader)?;
        number.decode_into(reader)?;
        *self = match tag {
            1 => MetadataValue::Bool(flag),
            2 => MetadataValue::Text(text),
            3 => MetadataValue::Number(number),
            _ => MetadataValue::None,
        };
        Ok(())
    }
}

impl Wire for MetadataTable {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        let (count, entries) = self.raw_parts();
        count.encode(sink)?;
        entries.encode(sink)
    }

    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
        let (count, entries) = self.raw_parts_mut();
        count.decode_into(reader)?;
        entries.decode_into(reader)?;
        self.normalize();
        Ok(())
    }
}

impl Wire for ErrorInfo {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        self.error_class.encode(sink)?;
        self.error_message.encode(sink)?;
        self.error_type.encode(sink)?;
        self.frame_count.encode(sink)?;
        self.stacktrace.encode(sink)
    }

    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
        self.error_class.decode_into(reader)?;
        self.error_message.decode_into(reader)?;
        self.error_type.decode_into(reader)?;
        self.frame_count.decode_into(reader)?;
        self.stacktrace.decode_into(reader)?;
        self.frame_count = self.frame_count.min(FRAMES_MAX);
        Ok(())
    }
}

impl Wire for DeviceInfo {
    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        self.api_level.encode(sink)?;
        self.cpu_abi_count.encode(sink)?;
        self.cpu_abi.encode(sink)?;
        self.orientation.encode(sink)?;
        self.time.encode(sink)?;
        self.id.encode(sink)?;
        self.jailbroken.encode(sink)?;
        self.locale.encode(sink)?;
        self.manufacturer.encode(sink)?;
        self.model.encode(sink)?;
        self.os_build.encode(sink)?;
        self.os_version.encode(sink)?;
        self.os_name.encode(sink)?;
        self.total_memory.encode(sink)
    }

    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), DecodeError> {
        self.api_level.decode_into(reader)?;
        self.cpu_abi_count.decode_into(reader)?;
        self.cpu_abi.decode_into(reader)?;
        self.orientation.decode_into(reader)?;
        self.time.decode_into(reader)?;
        self.id.decode_into(reader)?;
        self.jailbroken.decode_into(reader)?;
        self.locale.decode_into(reader)?;
        self.manufacturer.decode_into(reader)?;
        self.model.decode_into(reader)?;
        self.os_build.decode_into(reader)?;
        self.os_version.decode_into(reader)?;
        self.os_name.decode_into(reader)?;
        self.total_memory.decode_into(reader)?;
        self.cpu_abi_count = self.cpu_abi_count.min(CPU_ABI_MAX);
        Ok(())
    }
}

wire_struct!(Notifier { name, version, url });
wire_struct!(UserInfo { id, email, name });
wire_struct!(AppInfo {
    id,
    release_stage,
    app_type,
    version,
    active_screen,
    version_code,
    build_uuid,
    duration,
    duration_in_foreground,
    in_foreground,
    is_launching,
    binary_arch,
});
wire_struct!(StackFrame {
    frame_address,
    symbol_address,
    load_address,
    line_number,
    filename,
    method,
});
wire_struct!(BreadcrumbMetadata { key, value });
wire_struct!(Breadcrumb {
    kind,
    name,
    timestamp,
    metadata
});
wire_struct!(MetadataEntry {
    section,
    name,
    value
});

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded<T: Wire>(value: &T) -> Vec<u8> {
        let mut out = Vec::new();
        value.encode(&mut out).unwrap();
        out
    }

    #[test]
    fn test_scalars_are_fixed_width() {
        assert_eq!(encoded(&7i32).len(), 4);
        assert_eq!(encoded(&7usize).len(), 8);
        assert_eq!(encoded(&true), vec![1]);
        assert_eq!(encoded(&FixedStr::<16>::from("abc")).len(), 16);
        assert_eq!(encoded(&MetadataValue::None).len(), 4 + 1 + 64 + 8);
        assert_eq!(
            encoded(&MetadataValue::Bool(true)).len(),
            encoded(&MetadataValue::Number(1.0)).len()
        );
    }

    #[test]
    fn test_swapped_reader() {
        let bytes = 0x0102_0304u32.to_be_bytes();
        let mut reader = Reader::new(&bytes, cfg!(target_endian = "little"));
        assert_eq!(reader.u32().unwrap(), 0x0102_0304);
        assert_eq!(reader.remaining(), 0);
        assert!(matches!(reader.u32(), Err(DecodeError::Truncated)));
    }

    #[test]
    fn test_unknown_tags_default() {
        let bytes = encoded(&99i32);
        let mut kind = BreadcrumbType::User;
        kind.decode_into(&mut Reader::new(&bytes, false)).unwrap();
        assert_eq!(kind, BreadcrumbType::Manual);

        let mut severity = Severity::Info;
        severity
            .decode_into(&mut Reader::new(&bytes, false))
            .unwrap();
        assert_eq!(severity, Severity::Error);

        let mut value_bytes = encoded(&MetadataValue::Number(2.0));
        value_bytes[..4].copy_from_slice(&42i32.to_ne_bytes());
        let mut value = MetadataValue::Bool(true);
        value
            .decode_into(&mut Reader::new(&value_bytes, false))
            .unwrap();
        assert_eq!(value, MetadataValue::None);
    }

    #[test]
    fn test_counts_are_clamped() {
        let mut ring = Ring::<u32, 4>::default();
        ring.push(1);
        let mut bytes = encoded(&ring);
        bytes[..8].copy_from_slice(&1000u64.to_ne_bytes());
        bytes[8..16].copy_from_slice(&(u64::MAX).to_ne_bytes());
        let mut decoded = Ring::<u32, 4>::default();
        decoded
            .decode_into(&mut Reader::new(&bytes, false))
            .unwrap();
        assert_eq!(decoded.len(), 4);
        assert!(decoded.first_index() < 4);

        let mut error = ErrorInfo::default();
        let mut bytes = encoded(&error);
        let offset = 64 + 256 + 32;
        bytes[offset..offset + 8].copy_from_slice(&5000u64.to_ne_bytes());
        error
            .decode_into(&mut Reader::new(&bytes, false))
            .unwrap();
        assert_eq!(error.frames().len(), FRAMES_MAX);
    }
}
