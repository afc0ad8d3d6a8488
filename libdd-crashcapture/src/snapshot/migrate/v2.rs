// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Adds the session block to the report.

use super::v1::{AppInfoV1, BreadcrumbV1, DeviceInfoV1, ExceptionV1, ReportV1, BREADCRUMBS_MAX};
use crate::event::{MetadataTable, Notifier, Ring, Severity, UserInfo};
use crate::sigsafe::FixedStr;
use crate::snapshot::wire::wire_struct;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ReportV2 {
    pub notifier: Notifier,
    pub app: AppInfoV1,
    pub device: DeviceInfoV1,
    pub user: UserInfo,
    pub exception: ExceptionV1,
    pub metadata: MetadataTable,
    pub breadcrumbs: Ring<BreadcrumbV1, BREADCRUMBS_MAX>,
    pub context: FixedStr<64>,
    pub severity: Severity,
    pub session_id: FixedStr<33>,
    pub session_start: FixedStr<33>,
    pub handled_events: i32,
}

wire_struct!(ReportV2 {
    notifier,
    app,
    device,
    user,
    exception,
    metadata,
    breadcrumbs,
    context,
    severity,
    session_id,
    session_start,
    handled_events,
});

pub(crate) fn upgrade(v1: Box<ReportV1>) -> Box<ReportV2> {
    let mut v2 = Box::<ReportV2>::default();
    v2.notifier = v1.notifier;
    v2.app = v1.app;
    v2.device = v1.device;
    v2.user = v1.user;
    v2.exception = v1.exception;
    v2.metadata = v1.metadata;
    v2.breadcrumbs = v1.breadcrumbs;
    v2.context = v1.context;
    v2.severity = v1.severity;
    v2
}
