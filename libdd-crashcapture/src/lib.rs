// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Crash-safe capture and persistence of error events.
//!
//! Application threads mutate one [Event] through an [Environment]. When the process crashes,
//! the signal handler takes a [CrashContext], reads the event without blocking and writes a
//! versioned binary snapshot with no allocation. On the next start [recovery] decodes that
//! snapshot, upgrading older layouts, and [json] turns it into the upload document.
//!
//! Signal handler installation, stack unwinding and network transport live elsewhere.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod environment;
pub mod event;
pub mod json;
pub mod recovery;
pub mod seqlock;
mod shared;
pub mod sigsafe;
pub mod snapshot;
#[cfg(test)]
mod test_utils;

pub use environment::{CaptureOutcome, CrashContext, Environment};
pub use event::{Breadcrumb, BreadcrumbType, Event, ReleasePolicy, Severity};
pub use json::{project_event, to_json_string, EventPayload, Report};
pub use seqlock::{SeqLock, SeqLocked, WriteGuard};
pub use shared::configuration::CaptureConfiguration;
pub use snapshot::{
    deserialize_from_bytes, deserialize_from_file, serialize_to_fd, serialize_to_file,
    DecodeError, SnapshotHeader, CURRENT_VERSION,
};
