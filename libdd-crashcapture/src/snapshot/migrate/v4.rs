// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The breadcrumb ring grows to the current size, with longer names and more metadata pairs.
//! Adds the api key.

use super::v1::BreadcrumbV1;
use super::v3::{AppInfoV3, EventV3};
use crate::event::{
    Breadcrumb, BreadcrumbRing, DeviceInfo, ErrorInfo, MetadataTable, Notifier, Severity,
    UserInfo,
};
use crate::sigsafe::FixedStr;
use crate::snapshot::wire::wire_struct;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EventV4 {
    pub notifier: Notifier,
    pub app: AppInfoV3,
    pub device: DeviceInfo,
    pub user: UserInfo,
    pub error: ErrorInfo,
    pub metadata: MetadataTable,
    pub breadcrumbs: BreadcrumbRing,
    pub context: FixedStr<64>,
    pub severity: Severity,
    pub session_id: FixedStr<33>,
    pub session_start: FixedStr<33>,
    pub handled_events: i32,
    pub unhandled_events: i32,
    pub grouping_hash: FixedStr<64>,
    pub unhandled: bool,
    pub api_key: FixedStr<64>,
}

wire_struct!(EventV4 {
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
    api_key,
});

fn upgrade_breadcrumb(old: &BreadcrumbV1) -> Breadcrumb {
    let mut crumb = Breadcrumb {
        kind: old.kind,
        timestamp: old.timestamp,
        ..Default::default()
    };
    crumb.name.copy_from(&old.name);
    crumb.metadata[..old.metadata.len()].copy_from_slice(&old.metadata);
    crumb
}

pub(crate) fn upgrade(v3: Box<EventV3>) -> Box<EventV4> {
    let mut v4 = Box::<EventV4>::default();
    v4.notifier = v3.notifier;
    v4.app = v3.app;
    v4.device = v3.device;
    v4.user = v3.user;
    v4.error = v3.error;
    v4.metadata = v3.metadata;
    v4.breadcrumbs = v3.breadcrumbs.resized(upgrade_breadcrumb);
    v4.context = v3.context;
    v4.severity = v3.severity;
    v4.session_id = v3.session_id;
    v4.session_start = v3.session_start;
    v4.handled_events = v3.handled_events;
    v4.unhandled_events = v3.unhandled_events;
    v4.grouping_hash = v3.grouping_hash;
    v4.unhandled = v3.unhandled;
    v4
}
