// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Inline, NUL terminated UTF-8 text of at most `N - 1` bytes.
///
/// Writes never allocate and never fail: input longer than the capacity is truncated on a char
/// boundary. Bytes after the terminator are always zero, so two values with the same text
/// compare equal and encode to the same bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FixedStr<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    /// Number of text bytes that fit, leaving room for the terminator.
    pub const CAPACITY: usize = N.saturating_sub(1);

    pub const fn new() -> Self {
        Self { bytes: [0; N] }
    }

    pub fn set(&mut self, text: &str) {
        let mut end = text.len().min(Self::CAPACITY);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        // An embedded NUL would end the text early anyway.
        let end = text.as_bytes()[..end]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(end);
        self.bytes[..end].copy_from_slice(&text.as_bytes()[..end]);
        self.bytes[end..].fill(0);
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    pub fn len(&self) -> usize {
        self.bytes.iter().position(|&b| b == 0).unwrap_or(N)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.first().is_none_or(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// The text up to the terminator. Invalid UTF-8, which can only come from a corrupt
    /// snapshot, is cut at the first bad sequence.
    pub fn as_str(&self) -> &str {
        let bytes = self.as_bytes();
        match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                // SAFETY: `valid_up_to` marks the end of the longest valid prefix.
                unsafe { std::str::from_utf8_unchecked(&bytes[..e.valid_up_to()]) }
            }
        }
    }

    /// Copies text from a field of a different width, truncating if needed.
    pub fn copy_from<const M: usize>(&mut self, other: &FixedStr<M>) {
        self.set(other.as_str());
    }

    /// The full backing array, terminator and padding included.
    pub fn raw(&self) -> &[u8; N] {
        &self.bytes
    }

    /// Replaces the backing array with bytes read from storage, then restores the invariants:
    /// the text ends on a char boundary before the last byte, and padding is zeroed.
    pub(crate) fn load_raw(&mut self, raw: &[u8]) {
        let len = raw.len().min(N);
        self.bytes[..len].copy_from_slice(&raw[..len]);
        self.bytes[len..].fill(0);
        let end = self.len().min(Self::CAPACITY);
        let end = match std::str::from_utf8(&self.bytes[..end]) {
            Ok(_) => end,
            Err(e) => e.valid_up_to(),
        };
        self.bytes[end..].fill(0);
    }
}

impl<const N: usize> Default for FixedStr<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> From<&str> for FixedStr<N> {
    fn from(text: &str) -> Self {
        let mut value = Self::new();
        value.set(text);
        value
    }
}

impl<const N: usize> PartialEq<str> for FixedStr<N> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<const N: usize> PartialEq<&str> for FixedStr<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl<const N: usize> fmt::Debug for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
