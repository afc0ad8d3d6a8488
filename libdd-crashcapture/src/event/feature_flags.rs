// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Feature flags are the only part of an event whose text lives on the heap. Every drop of that
//! text goes through a [ReleasePolicy], so nothing is freed while a crash is being handled.

/// What to do with heap text that is no longer referenced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Free the memory now.
    #[default]
    Immediate,
    /// Leak it. Used while a crash is handled, since the allocator may be the thing that crashed.
    Deferred,
}

impl ReleasePolicy {
    pub fn release<T>(self, value: T) {
        match self {
            ReleasePolicy::Immediate => drop(value),
            ReleasePolicy::Deferred => std::mem::forget(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFlag {
    pub name: Box<str>,
    pub variant: Option<Box<str>>,
}

/// Ordered list of flags, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    flags: Vec<FeatureFlag>,
}

impl FeatureFlags {
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureFlag> {
        self.flags.iter()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureFlag> {
        self.flags.iter().find(|flag| &*flag.name == name)
    }

    /// Updates the variant of an existing flag in place, or appends a new one.
    pub fn set(&mut self, name: &str, variant: Option<&str>, policy: ReleasePolicy) {
        let variant = variant.map(Box::from);
        match self.flags.iter_mut().find(|flag| &*flag.name == name) {
            Some(flag) => policy.release(std::mem::replace(&mut flag.variant, variant)),
            None => self.flags.push(FeatureFlag {
                name: name.into(),
                variant,
            }),
        }
    }

    pub fn clear(&mut self, name: &str, policy: ReleasePolicy) {
        if let Some(index) = self.flags.iter().position(|flag| &*flag.name == name) {
            policy.release(self.flags.remove(index));
        }
    }

    pub fn clear_all(&mut self, policy: ReleasePolicy) {
        policy.release(std::mem::take(&mut self.flags));
    }

    pub(crate) fn push(&mut self, flag: FeatureFlag) {
        self.flags.push(flag);
    }
}
