// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::sigsafe::FixedStr;

/// Entries the metadata table can hold. Further insertions are dropped.
pub const METADATA_MAX: usize = 128;

pub type SectionName = FixedStr<32>;
pub type EntryName = FixedStr<32>;
pub type TextValue = FixedStr<64>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum MetadataValue {
    #[default]
    None,
    Bool(bool),
    Text(TextValue),
    Number(f64),
}

impl MetadataValue {
    pub(crate) fn tag(&self) -> i32 {
        match self {
            MetadataValue::None => 0,
            MetadataValue::Bool(_) => 1,
            MetadataValue::Text(_) => 2,
            MetadataValue::Number(_) => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetadataEntry {
    pub section: SectionName,
    pub name: EntryName,
    pub value: MetadataValue,
}

/// Flat `(section, name, value)` table. Pairs stay unique because every insertion scans for an
/// existing entry first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataTable {
    count: usize,
    entries: [MetadataEntry; METADATA_MAX],
}

impl Default for MetadataTable {
    fn default() -> Self {
        Self {
            count: 0,
            entries: [MetadataEntry::default(); METADATA_MAX],
        }
    }
}

impl MetadataTable {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetadataEntry> {
        self.entries[..self.count].iter()
    }

    pub fn get(&self, section: &str, name: &str) -> Option<&MetadataValue> {
        self.position(&section.into(), &name.into())
            .map(|i| &self.entries[i].value)
    }

    /// Overwrites the value stored under `section`/`name`, or appends a new entry. Returns
    /// false when the table is full and the entry was dropped.
    pub fn insert(&mut self, section: &str, name: &str, value: MetadataValue) -> bool {
        let section = SectionName::from(section);
        let name = EntryName::from(name);
        let index = match self.position(&section, &name) {
            Some(existing) => existing,
            None if self.count < METADATA_MAX => {
                self.count += 1;
                self.count - 1
            }
            None => return false,
        };
        self.entries[index] = MetadataEntry {
            section,
            name,
            value,
        };
        true
    }

    pub fn remove(&mut self, section: &str, name: &str) {
        let section = SectionName::from(section);
        let name = EntryName::from(name);
        self.retain(|entry| entry.section != section || entry.name != name);
    }

    pub fn remove_section(&mut self, section: &str) {
        let section = SectionName::from(section);
        self.retain(|entry| entry.section != section);
    }

    pub fn clear(&mut self) {
        self.retain(|_| false);
    }

    fn position(&self, section: &SectionName, name: &EntryName) -> Option<usize> {
        self.iter()
            .position(|entry| entry.section == *section && entry.name == *name)
    }

    /// Compacting removal: kept entries slide down in order, freed slots are reset.
    fn retain(&mut self, mut keep: impl FnMut(&MetadataEntry) -> bool) {
        let mut kept = 0;
        for i in 0..self.count {
            if keep(&self.entries[i]) {
                self.entries[kept] = self.entries[i];
                kept += 1;
            }
        }
        self.entries[kept..self.count].fill(MetadataEntry::default());
        self.count = kept;
    }

    pub(crate) fn raw_parts_mut(&mut self) -> (&mut usize, &mut [MetadataEntry; METADATA_MAX]) {
        (&mut self.count, &mut self.entries)
    }

    pub(crate) fn raw_parts(&self) -> (usize, &[MetadataEntry; METADATA_MAX]) {
        (self.count, &self.entries)
    }

    pub(crate) fn normalize(&mut self) {
        self.count = self.count.min(METADATA_MAX);
    }
}
