// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The record describing one crash or notified error.
//!
//! Everything except feature flag text is stored inline in fixed-width fields, so an [Event] can
//! be read and written to disk from a signal handler without touching the allocator. Mutators
//! never fail: input that does not fit is truncated or dropped.

mod breadcrumbs;
mod error;
mod feature_flags;
mod info;
mod metadata;

pub use breadcrumbs::*;
pub use error::*;
pub use feature_flags::*;
pub use info::*;
pub use metadata::*;

use crate::sigsafe::FixedStr;
use num_derive::{FromPrimitive, ToPrimitive};
use schemars::JsonSchema;
use serde::Serialize;

pub type SessionId = FixedStr<33>;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema, FromPrimitive, ToPrimitive,
)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum Severity {
    #[default]
    Error = 0,
    Warning,
    Info,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub notifier: Notifier,
    pub app: AppInfo,
    pub device: DeviceInfo,
    pub user: UserInfo,
    pub error: ErrorInfo,
    pub metadata: MetadataTable,
    pub breadcrumbs: BreadcrumbRing,
    pub context: FixedStr<64>,
    pub severity: Severity,
    pub session_id: SessionId,
    /// RFC 3339 time at which the session started.
    pub session_start: FixedStr<33>,
    pub handled_events: i32,
    pub unhandled_events: i32,
    pub grouping_hash: FixedStr<64>,
    pub unhandled: bool,
    pub api_key: FixedStr<64>,
    pub feature_flags: FeatureFlags,
}

impl Event {
    pub fn new() -> Box<Self> {
        Box::default()
    }

    pub fn set_context(&mut self, context: &str) {
        self.context.set(context);
    }

    pub fn set_user(&mut self, id: &str, email: &str, name: &str) {
        self.user = UserInfo::new(id, email, name);
    }

    pub fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    pub fn set_unhandled(&mut self, unhandled: bool) {
        self.unhandled = unhandled;
    }

    pub fn set_grouping_hash(&mut self, grouping_hash: &str) {
        self.grouping_hash.set(grouping_hash);
    }

    pub fn set_api_key(&mut self, api_key: &str) {
        self.api_key.set(api_key);
    }

    pub fn set_error(&mut self, error_class: &str, error_message: &str, error_type: &str) {
        self.error.set(error_class, error_message, error_type);
    }

    pub fn push_stack_frame(&mut self, frame: StackFrame) -> bool {
        self.error.push_frame(frame)
    }

    pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb) {
        self.breadcrumbs.push(breadcrumb);
    }

    pub fn add_metadata_bool(&mut self, section: &str, name: &str, value: bool) {
        self.metadata
            .insert(section, name, MetadataValue::Bool(value));
    }

    pub fn add_metadata_string(&mut self, section: &str, name: &str, value: &str) {
        self.metadata
            .insert(section, name, MetadataValue::Text(value.into()));
    }

    pub fn add_metadata_number(&mut self, section: &str, name: &str, value: f64) {
        self.metadata
            .insert(section, name, MetadataValue::Number(value));
    }

    pub fn get_metadata(&self, section: &str, name: &str) -> Option<&MetadataValue> {
        self.metadata.get(section, name)
    }

    pub fn remove_metadata(&mut self, section: &str, name: &str) {
        self.metadata.remove(section, name);
    }

    pub fn remove_metadata_section(&mut self, section: &str) {
        self.metadata.remove_section(section);
    }

    pub fn set_feature_flag(&mut self, name: &str, variant: Option<&str>, policy: ReleasePolicy) {
        self.feature_flags.set(name, variant, policy);
    }

    pub fn clear_feature_flag(&mut self, name: &str, policy: ReleasePolicy) {
        self.feature_flags.clear(name, policy);
    }

    pub fn clear_feature_flags(&mut self, policy: ReleasePolicy) {
        self.feature_flags.clear_all(policy);
    }

    /// Overwrites the session identity and both counters.
    pub fn start_session(
        &mut self,
        session_id: &str,
        started_at: &str,
        handled_events: i32,
        unhandled_events: i32,
    ) {
        self.session_id.set(session_id);
        self.session_start.set(started_at);
        self.set_session_counts(handled_events, unhandled_events);
    }

    pub fn set_session_counts(&mut self, handled_events: i32, unhandled_events: i32) {
        self.handled_events = handled_events;
        self.unhandled_events = unhandled_events;
    }

    pub fn has_session(&self) -> bool {
        !self.session_id.is_empty()
    }
}
