// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Building blocks that may be called while a crash signal is being handled.
//!
//! Everything exported from this module is async-signal-safe: no allocation, no locks, and only
//! system calls listed in <https://man7.org/linux/man-pages/man7/signal-safety.7.html>
//! (`open`, `write`, `close`, `unlink`). Code on the capture path should only reach for helpers
//! from here; `format!`, `String` and `std::io` buffered writers belong to ordinary context.

mod fd_writer;
mod fixed_str;
pub mod format;

pub use fd_writer::{unlink, EventPath, FdWriter, Sink, SnapshotError, EVENT_PATH_MAX};
pub use fixed_str::FixedStr;
