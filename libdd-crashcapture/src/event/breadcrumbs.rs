// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::sigsafe::FixedStr;
use num_derive::{FromPrimitive, ToPrimitive};
use schemars::JsonSchema;
use serde::Serialize;

/// Number of breadcrumbs kept; older ones are overwritten.
pub const BREADCRUMBS_MAX: usize = 50;
/// Key/value pairs a single breadcrumb can carry.
pub const BREADCRUMB_METADATA_MAX: usize = 8;

pub type BreadcrumbName = FixedStr<64>;
/// Room for an RFC 3339 timestamp with sub-second precision and offset.
pub type Timestamp = FixedStr<37>;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema, FromPrimitive, ToPrimitive,
)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum BreadcrumbType {
    Error = 0,
    Log,
    #[default]
    Manual,
    Navigation,
    Process,
    Request,
    State,
    User,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreadcrumbMetadata {
    pub key: FixedStr<32>,
    pub value: FixedStr<64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Breadcrumb {
    pub kind: BreadcrumbType,
    pub name: BreadcrumbName,
    pub timestamp: Timestamp,
    /// Slots with an empty key are unused.
    pub metadata: [BreadcrumbMetadata; BREADCRUMB_METADATA_MAX],
}

impl Breadcrumb {
    pub fn new(kind: BreadcrumbType, name: &str, timestamp: &str) -> Self {
        Self {
            kind,
            name: name.into(),
            timestamp: timestamp.into(),
            ..Default::default()
        }
    }

    /// A breadcrumb stamped with the current time, millisecond precision.
    /// Allocates; for use from the notifier API, not from a signal handler.
    pub fn now(kind: BreadcrumbType, name: &str) -> Self {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        Self::new(kind, name, &timestamp)
    }

    /// Sets `key` to `value`, replacing an existing value for the key. Pairs beyond
    /// [BREADCRUMB_METADATA_MAX] are dropped. Empty keys are ignored.
    pub fn add_metadata(&mut self, key: &str, value: &str) {
        let key = FixedStr::<32>::from(key);
        if key.is_empty() {
            return;
        }
        let slot = match self.metadata.iter().position(|pair| pair.key == key) {
            Some(existing) => Some(existing),
            None => self.metadata.iter().position(|pair| pair.key.is_empty()),
        };
        if let Some(slot) = slot {
            self.metadata[slot] = BreadcrumbMetadata {
                key,
                value: value.into(),
            };
        }
    }

    pub fn metadata(&self) -> impl Iterator<Item = &BreadcrumbMetadata> {
        self.metadata.iter().filter(|pair| !pair.key.is_empty())
    }
}

/// Fixed-capacity ring: valid entries occupy `[first_index, first_index + len) mod N`.
///
/// Pushing onto a full ring overwrites the oldest entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring<T, const N: usize> {
    count: usize,
    first_index: usize,
    slots: [T; N],
}

impl<T: Copy + Default, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        Self {
            count: 0,
            first_index: 0,
            slots: [T::default(); N],
        }
    }
}

impl<T: Copy + Default, const N: usize> Ring<T, N> {
    pub const CAPACITY: usize = N;

    pub fn push(&mut self, value: T) {
        if N == 0 {
            return;
        }
        let index = (self.first_index + self.count) % N;
        self.slots[index] = value;
        if self.count < N {
            self.count += 1;
        } else {
            self.first_index = (self.first_index + 1) % N;
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        (0..self.count).map(move |i| &self.slots[(self.first_index + i) % N])
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.first_index = 0;
        self.slots = [T::default(); N];
    }

    /// Copies the newest entries, oldest first, into a ring of a different capacity.
    pub fn resized<U, const M: usize>(&self, mut convert: impl FnMut(&T) -> U) -> Ring<U, M>
    where
        U: Copy + Default,
    {
        let mut resized = Ring::<U, M>::default();
        let skip = self.count.saturating_sub(M);
        for entry in self.iter().skip(skip) {
            resized.push(convert(entry));
        }
        resized
    }

    pub(crate) fn raw_parts(&self) -> (usize, usize, &[T; N]) {
        (self.count, self.first_index, &self.slots)
    }

    pub(crate) fn raw_parts_mut(&mut self) -> (&mut usize, &mut usize, &mut [T; N]) {
        (&mut self.count, &mut self.first_index, &mut self.slots)
    }

    /// Clamps the bookkeeping read from storage back into range.
    pub(crate) fn normalize(&mut self) {
        self.count = self.count.min(N);
        self.first_index = if N == 0 { 0 } else { self.first_index % N };
    }
}

pub type BreadcrumbRing = Ring<Breadcrumb, BREADCRUMBS_MAX>;
