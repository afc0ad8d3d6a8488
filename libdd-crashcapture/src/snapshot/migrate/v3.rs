// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The report becomes an event: the app block is keyed by id and gains a type and binary
//! architecture, the device block lists every CPU ABI and records time, locale and OS name, and
//! the indexed exception becomes the general error block.

use super::v1::{BreadcrumbV1, BREADCRUMBS_MAX};
use super::v2::ReportV2;
use crate::event::{
    DeviceInfo, ErrorInfo, MetadataTable, Notifier, Ring, Severity, UserInfo,
};
use crate::sigsafe::FixedStr;
use crate::snapshot::wire::wire_struct;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct AppInfoV3 {
    pub id: FixedStr<64>,
    pub release_stage: FixedStr<64>,
    pub app_type: FixedStr<32>,
    pub version: FixedStr<32>,
    pub active_screen: FixedStr<64>,
    pub version_code: i64,
    pub build_uuid: FixedStr<64>,
    pub duration: i64,
    pub duration_in_foreground: i64,
    pub in_foreground: bool,
    pub binary_arch: FixedStr<32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EventV3 {
    pub notifier: Notifier,
    pub app: AppInfoV3,
    pub device: DeviceInfo,
    pub user: UserInfo,
    pub error: ErrorInfo,
    pub metadata: MetadataTable,
    pub breadcrumbs: Ring<BreadcrumbV1, BREADCRUMBS_MAX>,
    pub context: FixedStr<64>,
    pub severity: Severity,
    pub session_id: FixedStr<33>,
    pub session_start: FixedStr<33>,
    pub handled_events: i32,
    pub unhandled_events: i32,
    pub grouping_hash: FixedStr<64>,
    pub unhandled: bool,
}

wire_struct!(AppInfoV3 {
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
    binary_arch,
});
wire_struct!(EventV3 {
    notifier,
    app,
    device,
    user,
    error,
    metadata,
    breadcrumbs,
    context,
    severity,
    session_id,
    session_start,
    handled_events,
    unhandled_events,
    grouping_hash,
    unhandled,
});

pub(crate) fn upgrade(v2: Box<ReportV2>) -> Box<EventV3> {
    let mut v3 = Box::<EventV3>::default();
    v3.notifier = v2.notifier;

    let app = &v2.app;
    v3.app.id = app.package_name;
    v3.app.release_stage = app.release_stage;
    v3.app.version = app.version;
    v3.app.active_screen = app.active_screen;
    v3.app.version_code = app.version_code;
    v3.app.build_uuid = app.build_uuid;
    v3.app.duration = app.duration;
    v3.app.duration_in_foreground = app.duration_in_foreground;
    v3.app.in_foreground = app.in_foreground;

    let device = &v2.device;
    v3.device.api_level = device.api_level;
    if !device.cpu_abi.is_empty() {
        v3.device.set_cpu_abis([device.cpu_abi.as_str()]);
    }
    v3.device.orientation = device.orientation;
    v3.device.id = device.id;
    v3.device.jailbroken = device.jailbroken;
    v3.device.manufacturer = device.manufacturer;
    v3.device.model = device.model;
    v3.device.os_build = device.os_build;
    v3.device.os_version = device.os_version;
    v3.device.total_memory = device.total_memory;

    v3.user = v2.user;

    let exception = &v2.exception;
    v3.error.set(
        exception.name.as_str(),
        exception.message.as_str(),
        exception.error_type.as_str(),
    );
    for frame in exception.frames.iter().take(exception.frame_count) {
        v3.error.push_frame(*frame);
    }

    v3.metadata = v2.metadata;
    v3.breadcrumbs = v2.breadcrumbs;
    v3.context = v2.context;
    v3.severity = v2.severity;
    v3.session_id = v2.session_id;
    v3.session_start = v2.session_start;
    v3.handled_events = v2.handled_events;
    v3
}
