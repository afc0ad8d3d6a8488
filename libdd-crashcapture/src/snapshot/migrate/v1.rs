// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! First layout: a "report" with one indexed exception and a 25-slot breadcrumb ring.

use crate::event::{
    BreadcrumbMetadata, BreadcrumbType, MetadataTable, Notifier, Ring, Severity, StackFrame,
    UserInfo, FRAMES_MAX,
};
use crate::sigsafe::FixedStr;
use crate::snapshot::wire::wire_struct;

pub(crate) const BREADCRUMBS_MAX: usize = 25;
pub(crate) const BREADCRUMB_METADATA_MAX: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct AppInfoV1 {
    pub package_name: FixedStr<64>,
    pub version: FixedStr<32>,
    pub version_code: i64,
    pub build_uuid: FixedStr<64>,
    pub release_stage: FixedStr<64>,
    pub duration: i64,
    pub duration_in_foreground: i64,
    pub in_foreground: bool,
    pub active_screen: FixedStr<64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct DeviceInfoV1 {
    pub api_level: i32,
    pub cpu_abi: FixedStr<32>,
    pub orientation: FixedStr<32>,
    pub id: FixedStr<64>,
    pub jailbroken: bool,
    pub manufacturer: FixedStr<64>,
    pub model: FixedStr<64>,
    pub os_build: FixedStr<64>,
    pub os_version: FixedStr<64>,
    pub total_memory: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ExceptionV1 {
    pub name: FixedStr<64>,
    pub message: FixedStr<256>,
    pub error_type: FixedStr<32>,
    pub frame_count: usize,
    pub frames: [StackFrame; FRAMES_MAX],
}

impl Default for ExceptionV1 {
    fn default() -> Self {
        Self {
            name: FixedStr::new(),
            message: FixedStr::new(),
            error_type: FixedStr::new(),
            frame_count: 0,
            frames: [StackFrame::default(); FRAMES_MAX],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct BreadcrumbV1 {
    pub kind: BreadcrumbType,
    pub name: FixedStr<33>,
    pub timestamp: FixedStr<37>,
    pub metadata: [BreadcrumbMetadata; BREADCRUMB_METADATA_MAX],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ReportV1 {
    pub notifier: Notifier,
    pub app: AppInfoV1,
    pub device: DeviceInfoV1,
    pub user: UserInfo,
    pub exception: ExceptionV1,
    pub metadata: MetadataTable,
    pub breadcrumbs: Ring<BreadcrumbV1, BREADCRUMBS_MAX>,
    pub context: FixedStr<64>,
    pub severity: Severity,
}

wire_struct!(AppInfoV1 {
    package_name,
    version,
    version_code,
    build_uuid,
    release_stage,
    duration,
    duration_in_foreground,
    in_foreground,
    active_screen,
});
wire_struct!(DeviceInfoV1 {
    api_level,
    cpu_abi,
    orientation,
    id,
    jailbroken,
    manufacturer,
    model,
    os_build,
    os_version,
    total_memory,
});
wire_struct!(ExceptionV1 {
    name,
    message,
    error_type,
    frame_count,
    frames,
});
wire_struct!(BreadcrumbV1 {
    kind,
    name,
    timestamp,
    metadata,
});
wire_struct!(ReportV1 {
    notifier,
    app,
    device,
    user,
    exception,
    metadata,
    breadcrumbs,
    context,
    severity,
});
