// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::sigsafe::FixedStr;

/// Number of CPU ABIs a device can report.
pub const CPU_ABI_MAX: usize = 8;

pub type CpuAbi = FixedStr<32>;

/// Identifies the library that produced the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Notifier {
    pub name: FixedStr<64>,
    pub version: FixedStr<16>,
    pub url: FixedStr<64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppInfo {
    /// Package or bundle identifier.
    pub id: FixedStr<64>,
    pub release_stage: FixedStr<64>,
    pub app_type: FixedStr<32>,
    pub version: FixedStr<32>,
    pub active_screen: FixedStr<64>,
    pub version_code: i64,
    pub build_uuid: FixedStr<64>,
    /// Milliseconds since launch.
    pub duration: i64,
    pub duration_in_foreground: i64,
    pub in_foreground: bool,
    pub is_launching: bool,
    pub binary_arch: FixedStr<32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub api_level: i32,
    pub(crate) cpu_abi_count: usize,
    pub(crate) cpu_abi: [CpuAbi; CPU_ABI_MAX],
    pub orientation: FixedStr<32>,
    /// Seconds since the Unix epoch.
    pub time: i64,
    pub id: FixedStr<64>,
    pub jailbroken: bool,
    pub locale: FixedStr<32>,
    pub manufacturer: FixedStr<64>,
    pub model: FixedStr<64>,
    pub os_build: FixedStr<64>,
    pub os_version: FixedStr<64>,
    pub os_name: FixedStr<64>,
    pub total_memory: i64,
}

impl DeviceInfo {
    /// Replaces the ABI list. Entries past [CPU_ABI_MAX] are dropped.
    pub fn set_cpu_abis<'a>(&mut self, abis: impl IntoIterator<Item = &'a str>) {
        self.cpu_abi = Default::default();
        self.cpu_abi_count = 0;
        for abi in abis.into_iter().take(CPU_ABI_MAX) {
            self.cpu_abi[self.cpu_abi_count].set(abi);
            self.cpu_abi_count += 1;
        }
    }

    pub fn cpu_abis(&self) -> &[CpuAbi] {
        &self.cpu_abi[..self.cpu_abi_count.min(CPU_ABI_MAX)]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub id: FixedStr<64>,
    pub email: FixedStr<64>,
    pub name: FixedStr<64>,
}

impl UserInfo {
    pub fn new(id: &str, email: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }
}
