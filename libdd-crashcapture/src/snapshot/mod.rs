// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Versioned binary snapshot of an [Event].
//!
//! ```text
//! header:
//!   i32       format_version
//!   i32       big_endian      nonzero if the writer was big-endian
//!   [u8; 64]  os_build
//! event image, current layout:
//!   every fixed-width field of the event in declaration order
//! feature flag trailer:
//!   u32 count, then per flag
//!     u32 name_len, name bytes, u8 has_variant, u32 variant_len, variant bytes
//! ```
//!
//! Writing is async-signal-safe: it streams through an [FdWriter] and never allocates. Reading
//! runs after restart; images written by older versions are decoded with their own layout and
//! upgraded step by step (see `migrate`).

mod migrate;
pub(crate) mod wire;

use crate::event::{ErrorInfo, Event, FeatureFlag, FeatureFlags, Severity};
use crate::sigsafe::{FdWriter, FixedStr, Sink, SnapshotError};
use std::ffi::CStr;
use std::path::Path;
use thiserror::Error;
use wire::{Reader, Wire};

/// Format written by this version of the library.
pub const CURRENT_VERSION: i32 = 5;
pub const OS_BUILD_LEN: usize = 64;
pub const HEADER_LEN: usize = 4 + 4 + OS_BUILD_LEN;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("No snapshot file")]
    Missing,
    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot ended early")]
    Truncated,
    #[error("Snapshot format version {0} is newer than {CURRENT_VERSION}")]
    UnsupportedVersion(i32),
    #[error("Snapshot header carries invalid format version {0}")]
    InvalidHeader(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub(crate) version: i32,
    pub(crate) big_endian: bool,
    pub(crate) os_build: FixedStr<OS_BUILD_LEN>,
}

impl SnapshotHeader {
    /// Header for a snapshot written by this process.
    pub fn new(os_build: &str) -> Self {
        Self {
            version: CURRENT_VERSION,
            big_endian: cfg!(target_endian = "big"),
            os_build: os_build.into(),
        }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn big_endian(&self) -> bool {
        self.big_endian
    }

    pub fn os_build(&self) -> &str {
        self.os_build.as_str()
    }

    fn encode<S: Sink>(&self, sink: &mut S) -> Result<(), SnapshotError> {
        self.version.encode(sink)?;
        i32::from(self.big_endian).encode(sink)?;
        self.os_build.encode(sink)
    }

    /// Reads the header and points `reader` at the writer's byte order.
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let version = reader.raw(4)?;
        // Zero and nonzero look the same in either byte order.
        let big_endian = reader.raw(4)?.iter().any(|b| *b != 0);
        let swap = big_endian != cfg!(target_endian = "big");
        reader.set_swap(swap);
        let version = Reader::new(version, swap).u32()? as i32;
        let mut os_build = FixedStr::new();
        os_build.decode_into(reader)?;
        Ok(Self {
            version,
            big_endian,
            os_build,
        })
    }
}

/// State that replaces parts of the shared event while a crash is written.
pub(crate) struct CrashOverrides<'a> {
    pub(crate) error: &'a ErrorInfo,
    /// Seconds since the epoch, or 0 to keep the recorded device time.
    pub(crate) time: i64,
    /// False once a writer may have touched the event. Checked before following the heap
    /// pointers of the feature flag trailer.
    pub(crate) still_valid: &'a dyn Fn() -> bool,
}

/// Writes `header`, then the current layout of `event`.
pub fn write_snapshot<S: Sink>(
    sink: &mut S,
    header: &SnapshotHeader,
    event: &Event,
) -> Result<(), SnapshotError> {
    header.encode(sink)?;
    encode_event(event, None, sink)
}

/// Writes a snapshot of `event` onto an open descriptor. Async-signal-safe.
pub fn serialize_to_fd(fd: libc::c_int, header: &SnapshotHeader, event: &Event) -> bool {
    let mut writer = FdWriter::borrowed(fd);
    write_snapshot(&mut writer, header, event)
        .and_then(|_| writer.finish())
        .is_ok()
}

/// Creates or truncates `path` and writes a snapshot of `event` into it. Async-signal-safe.
/// Failures are not retried; the event is lost.
pub fn serialize_to_file(path: &CStr, header: &SnapshotHeader, event: &Event) -> bool {
    write_file(path, header, event, None).is_ok()
}

pub(crate) fn write_file(
    path: &CStr,
    header: &SnapshotHeader,
    event: &Event,
    crash: Option<&CrashOverrides<'_>>,
) -> Result<(), SnapshotError> {
    let mut writer = FdWriter::create(path)?;
    header.encode(&mut writer)?;
    encode_event(event, crash, &mut writer)?;
    writer.finish()
}

fn encode_event<S: Sink>(
    event: &Event,
    crash: Option<&CrashOverrides<'_>>,
    sink: &mut S,
) -> Result<(), SnapshotError> {
    let mut device = event.device;
    let mut error = &event.error;
    let mut severity = event.severity;
    let mut unhandled_events = event.unhandled_events;
    let mut unhandled = event.unhandled;
    if let Some(crash) = crash {
        error = crash.error;
        severity = Severity::Error;
        unhandled = true;
        if event.has_session() {
            unhandled_events = unhandled_events.saturating_add(1);
        }
        if crash.time != 0 {
            device.time = crash.time;
        }
    }

    event.notifier.encode(sink)?;
    event.app.encode(sink)?;
    device.encode(sink)?;
    event.user.encode(sink)?;
    error.encode(sink)?;
    event.metadata.encode(sink)?;
    event.breadcrumbs.encode(sink)?;
    event.context.encode(sink)?;
    severity.encode(sink)?;
    event.session_id.encode(sink)?;
    event.session_start.encode(sink)?;
    event.handled_events.encode(sink)?;
    unhandled_events.encode(sink)?;
    event.grouping_hash.encode(sink)?;
    unhandled.encode(sink)?;
    event.api_key.encode(sink)?;
    if crash.is_some_and(|crash| !(crash.still_valid)()) {
        return Err(SnapshotError::Torn);
    }
    encode_feature_flags(&event.feature_flags, sink)
}

fn encode_feature_flags<S: Sink>(
    flags: &FeatureFlags,
    sink: &mut S,
) -> Result<(), SnapshotError> {
    (flags.len() as u32).encode(sink)?;
    for flag in flags.iter() {
        encode_text(&flag.name, sink)?;
        flag.variant.is_some().encode(sink)?;
        encode_text(flag.variant.as_deref().unwrap_or_default(), sink)?;
    }
    Ok(())
}

fn encode_text<S: Sink>(text: &str, sink: &mut S) -> Result<(), SnapshotError> {
    (text.len() as u32).encode(sink)?;
    sink.put(text.as_bytes())
}

fn decode_event(reader: &mut Reader<'_>) -> Result<Box<Event>, DecodeError> {
    let mut event = Event::new();
    event.notifier.decode_into(reader)?;
    event.app.decode_into(reader)?;
    event.device.decode_into(reader)?;
    event.user.decode_into(reader)?;
    event.error.decode_into(reader)?;
    event.metadata.decode_into(reader)?;
    event.breadcrumbs.decode_into(reader)?;
    event.context.decode_into(reader)?;
    event.severity.decode_into(reader)?;
    event.session_id.decode_into(reader)?;
    event.session_start.decode_into(reader)?;
    event.handled_events.decode_into(reader)?;
    event.unhandled_events.decode_into(reader)?;
    event.grouping_hash.decode_into(reader)?;
    event.unhandled.decode_into(reader)?;
    event.api_key.decode_into(reader)?;
    decode_feature_flags(&mut event.feature_flags, reader)?;
    Ok(event)
}

fn decode_feature_flags(
    flags: &mut FeatureFlags,
    reader: &mut Reader<'_>,
) -> Result<(), DecodeError> {
    let count = reader.u32()?;
    for _ in 0..count {
        let name = decode_text(reader)?;
        let mut has_variant = false;
        has_variant.decode_into(reader)?;
        let variant = decode_text(reader)?;
        flags.push(FeatureFlag {
            name,
            variant: has_variant.then_some(variant),
        });
    }
    Ok(())
}

fn decode_text(reader: &mut Reader<'_>) -> Result<Box<str>, DecodeError> {
    let len = reader.u32()? as usize;
    Ok(String::from_utf8_lossy(reader.raw(len)?).into())
}

/// Decodes a snapshot of any supported version into the current event layout.
pub fn deserialize_from_bytes(bytes: &[u8]) -> Result<Box<Event>, DecodeError> {
    decode_snapshot(bytes).map(|(_, event)| event)
}

/// Like [deserialize_from_bytes], also returning the header as stored.
pub fn decode_snapshot(bytes: &[u8]) -> Result<(SnapshotHeader, Box<Event>), DecodeError> {
    let mut reader = Reader::new(bytes, false);
    let header = SnapshotHeader::decode(&mut reader)?;
    let event = match header.version {
        CURRENT_VERSION => decode_event(&mut reader)?,
        version if version > CURRENT_VERSION => {
            return Err(DecodeError::UnsupportedVersion(version))
        }
        version if version < 1 => return Err(DecodeError::InvalidHeader(version)),
        version => migrate::decode_historical(version, &mut reader)?,
    };
    Ok((header, event))
}

pub fn deserialize_from_file(path: &Path) -> Result<Box<Event>, DecodeError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DecodeError::Missing,
        _ => DecodeError::Io(e),
    })?;
    deserialize_from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Breadcrumb, BreadcrumbType, BREADCRUMBS_MAX};
    use crate::sigsafe::EventPath;
    use crate::test_utils::sample_event;

    fn encoded(event: &Event) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &SnapshotHeader::new("QP1A.190711.020"), event).unwrap();
        bytes
    }

    #[test]
    fn test_round_trip_bytes() {
        let event = sample_event();
        let bytes = encoded(&event);
        let (header, decoded) = decode_snapshot(&bytes).unwrap();
        assert_eq!(header.version(), CURRENT_VERSION);
        assert_eq!(header.os_build(), "QP1A.190711.020");
        assert_eq!(*decoded, *event);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_round_trip_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = EventPath::new(&dir.path().join("event.crash")).unwrap();
        let mut event = sample_event();
        for i in 0..BREADCRUMBS_MAX + 4 {
            event.add_breadcrumb(Breadcrumb::new(BreadcrumbType::Log, &format!("{i}"), ""));
        }
        assert!(serialize_to_file(
            path.as_c_str(),
            &SnapshotHeader::new("build"),
            &event
        ));
        let decoded = deserialize_from_file(path.as_path())?;
        assert_eq!(decoded.breadcrumbs.first_index(), 6);
        assert_eq!(*decoded, *event);
        Ok(())
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_serialize_to_fd() -> anyhow::Result<()> {
        use std::os::fd::AsRawFd;
        let file = tempfile::NamedTempFile::new()?;
        let event = sample_event();
        assert!(serialize_to_fd(
            file.as_file().as_raw_fd(),
            &SnapshotHeader::new("QP1A.190711.020"),
            &event
        ));
        assert_eq!(std::fs::read(file.path())?, encoded(&event));
        Ok(())
    }

    #[test]
    fn test_unwritable_path_fails() {
        let path = EventPath::new(Path::new("/nonexistent-dir/event.crash")).unwrap();
        assert!(!serialize_to_file(
            path.as_c_str(),
            &SnapshotHeader::new("build"),
            &Event::default()
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            deserialize_from_file(&dir.path().join("nope")),
            Err(DecodeError::Missing)
        ));
    }

    #[test]
    fn test_truncated_everywhere() {
        let bytes = encoded(&sample_event());
        // Cutting inside the header, the image or the trailer never yields an event.
        let cuts = [
            0,
            3,
            HEADER_LEN - 1,
            HEADER_LEN,
            HEADER_LEN + 100,
            bytes.len() / 2,
            bytes.len() - 1,
        ];
        for len in cuts {
            assert!(
                matches!(
                    deserialize_from_bytes(&bytes[..len]),
                    Err(DecodeError::Truncated)
                ),
                "prefix of {len} bytes decoded"
            );
        }
    }

    #[test]
    fn test_version_bounds() {
        let mut bytes = encoded(&Event::default());
        bytes[..4].copy_from_slice(&(CURRENT_VERSION + 1).to_ne_bytes());
        assert!(matches!(
            deserialize_from_bytes(&bytes),
            Err(DecodeError::UnsupportedVersion(v)) if v == CURRENT_VERSION + 1
        ));
        bytes[..4].copy_from_slice(&0i32.to_ne_bytes());
        assert!(matches!(
            deserialize_from_bytes(&bytes),
            Err(DecodeError::InvalidHeader(0))
        ));
        bytes[..4].copy_from_slice(&(-3i32).to_ne_bytes());
        assert!(matches!(
            deserialize_from_bytes(&bytes),
            Err(DecodeError::InvalidHeader(-3))
        ));
    }

    /// Re-encodes a snapshot as if it were written by a host of the other byte order.
    struct Swapped(Vec<u8>);

    impl Swapped {
        fn scalar(&mut self, bytes: &[u8]) {
            self.0.extend(bytes.iter().rev());
        }
    }

    #[test]
    fn test_foreign_endianness() {
        let mut event = Event::new();
        event.app.version_code = 0x0102_0304_0506_0708;
        event.handled_events = 7;
        event.app.version.set("2.0.52");

        let mut out = Swapped(Vec::new());
        out.scalar(&CURRENT_VERSION.to_ne_bytes());
        out.scalar(&i32::from(!cfg!(target_endian = "big")).to_ne_bytes());
        out.0.extend_from_slice(FixedStr::<OS_BUILD_LEN>::from("build").raw());

        // Swap every scalar of the image by re-encoding each field through a byte-reversing sink.
        struct Reversing<'a>(&'a mut Swapped);
        impl Sink for Reversing<'_> {
            fn put(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
                match bytes.len() {
                    4 | 8 => self.0.scalar(bytes),
                    _ => self.0 .0.extend_from_slice(bytes),
                }
                Ok(())
            }
        }
        encode_event(&event, None, &mut Reversing(&mut out)).unwrap();

        let (header, decoded) = decode_snapshot(&out.0).unwrap();
        assert_eq!(header.big_endian(), !cfg!(target_endian = "big"));
        assert_eq!(header.version(), CURRENT_VERSION);
        assert_eq!(decoded.app.version_code, 0x0102_0304_0506_0708);
        assert_eq!(decoded.handled_events, 7);
        assert_eq!(decoded.app.version, "2.0.52");
        assert_eq!(*decoded, *event);
    }

    #[test]
    fn test_crash_overrides() {
        let event = sample_event();
        let mut crash_error = ErrorInfo::default();
        crash_error.set("SIGSEGV", "Segmentation violation", "c");
        let overrides = CrashOverrides {
            error: &crash_error,
            time: 1_600_000_000,
            still_valid: &|| true,
        };
        let mut bytes = Vec::new();
        SnapshotHeader::new("build").encode(&mut bytes).unwrap();
        encode_event(&event, Some(&overrides), &mut bytes).unwrap();

        let decoded = deserialize_from_bytes(&bytes).unwrap();
        assert_eq!(decoded.error, crash_error);
        assert_eq!(decoded.severity, Severity::Error);
        assert!(decoded.unhandled);
        assert_eq!(decoded.unhandled_events, event.unhandled_events + 1);
        assert_eq!(decoded.handled_events, event.handled_events);
        assert_eq!(decoded.device.time, 1_600_000_000);
    }

    #[test]
    fn test_crash_write_stops_before_flags_when_invalidated() {
        let event = sample_event();
        let crash_error = ErrorInfo::default();
        let overrides = CrashOverrides {
            error: &crash_error,
            time: 0,
            still_valid: &|| false,
        };
        let mut bytes = Vec::new();
        assert_eq!(
            encode_event(&event, Some(&overrides), &mut bytes),
            Err(SnapshotError::Torn)
        );

        // Everything up to the trailer was written; the trailer was not.
        let mut full = Vec::new();
        encode_event(&event, None, &mut full).unwrap();
        let flags_len = full.len() - bytes.len();
        let mut trailer = Vec::new();
        encode_feature_flags(&event.feature_flags, &mut trailer).unwrap();
        assert_eq!(flags_len, trailer.len());
    }
}
