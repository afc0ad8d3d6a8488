// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoders for layouts written by older versions.
//!
//! Each `vN` module owns the layout of format version N and a pure `upgrade` from version N - 1.
//! A snapshot is decoded with the layout it was written with, then upgraded one version at a
//! time. Upgrades are total: new fields start at their defaults and anything that no longer fits
//! is truncated.

mod v1;
mod v2;
mod v3;
mod v4;

use super::wire::{Reader, Wire};
use super::DecodeError;
use crate::event::Event;

pub(super) fn decode_historical(
    version: i32,
    reader: &mut Reader<'_>,
) -> Result<Box<Event>, DecodeError> {
    let event = match version {
        1 => into_current(v4::upgrade(v3::upgrade(v2::upgrade(decode(reader)?)))),
        2 => into_current(v4::upgrade(v3::upgrade(decode(reader)?))),
        3 => into_current(v4::upgrade(decode(reader)?)),
        4 => into_current(decode(reader)?),
        _ => return Err(DecodeError::UnsupportedVersion(version)),
    };
    Ok(event)
}

fn decode<T: Wire + Default>(reader: &mut Reader<'_>) -> Result<Box<T>, DecodeError> {
    let mut layout = Box::<T>::default();
    layout.decode_into(reader)?;
    Ok(layout)
}

/// Version 5 adds the launch flag and the feature flag trailer; neither exists in older files.
fn into_current(v4: Box<v4::EventV4>) -> Box<Event> {
    let mut event = Event::new();
    event.notifier = v4.notifier;

    let app = &v4.app;
    event.app.id = app.id;
    event.app.release_stage = app.release_stage;
    event.app.app_type = app.app_type;
    event.app.version = app.version;
    event.app.active_screen = app.active_screen;
    event.app.version_code = app.version_code;
    event.app.build_uuid = app.build_uuid;
    event.app.duration = app.duration;
    event.app.duration_in_foreground = app.duration_in_foreground;
    event.app.in_foreground = app.in_foreground;
    event.app.binary_arch = app.binary_arch;

    event.device = v4.device;
    event.user = v4.user;
    event.error = v4.error;
    event.metadata = v4.metadata;
    event.breadcrumbs = v4.breadcrumbs;
    event.context = v4.context;
    event.severity = v4.severity;
    event.session_id = v4.session_id;
    event.session_start = v4.session_start;
    event.handled_events = v4.handled_events;
    event.unhandled_events = v4.unhandled_events;
    event.grouping_hash = v4.grouping_hash;
    event.unhandled = v4.unhandled;
    event.api_key = v4.api_key;
    event
}
