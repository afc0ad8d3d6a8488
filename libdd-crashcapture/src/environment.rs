// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The process-lifetime capture context.
//!
//! One [Environment] is built at startup and handed to whatever needs the event: the notifier
//! API mutates it through [Environment::update], and the crash handler obtains a [CrashContext]
//! through [Environment::enter_crash_handling]. Only the latter may be used from a signal
//! handler.

use crate::event::{ErrorInfo, Event, ReleasePolicy};
use crate::seqlock::SeqLocked;
use crate::shared::configuration::CaptureConfiguration;
use crate::sigsafe::{unlink, EventPath, SnapshotError};
use crate::snapshot::{self, CrashOverrides, SnapshotHeader};
use std::cell::UnsafeCell;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The snapshot is on disk.
    Persisted,
    /// A writer was active during the capture; nothing was kept.
    Abandoned,
    Failed(SnapshotError),
}

/// Crash-only data, filled in by the handler instead of the shared event.
#[derive(Default)]
struct CrashScratch {
    error: ErrorInfo,
    time: i64,
}

pub struct Environment {
    event: SeqLocked<Box<Event>>,
    path: EventPath,
    header: SnapshotHeader,
    handling_crash: AtomicBool,
    scratch: UnsafeCell<Box<CrashScratch>>,
}

// SAFETY: the event is guarded by its seqlock. The scratch is only reachable through the single
// CrashContext handed out by `enter_crash_handling`.
unsafe impl Sync for Environment {}

impl Environment {
    pub fn new(config: &CaptureConfiguration) -> anyhow::Result<Self> {
        Self::from_event(config, Event::new())
    }

    pub fn from_event(config: &CaptureConfiguration, event: Box<Event>) -> anyhow::Result<Self> {
        Ok(Self {
            event: SeqLocked::new(event),
            path: config.fixed_event_path()?,
            header: SnapshotHeader::new(config.os_build()),
            handling_crash: AtomicBool::new(false),
            scratch: UnsafeCell::new(Box::default()),
        })
    }

    pub fn event_path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    pub fn is_handling_crash(&self) -> bool {
        self.handling_crash.load(Ordering::Acquire)
    }

    /// How heap text dropped right now must be released.
    pub fn release_policy(&self) -> ReleasePolicy {
        if self.is_handling_crash() {
            ReleasePolicy::Deferred
        } else {
            ReleasePolicy::Immediate
        }
    }

    /// Mutates the event inside a write section.
    ///
    /// SIGNAL SAFETY:
    ///     Never call this from a signal handler; it spins while another writer is active.
    pub fn update<R>(&self, f: impl FnOnce(&mut Event, ReleasePolicy) -> R) -> R {
        let policy = self.release_policy();
        self.event.write(|event| f(event.as_mut(), policy))
    }

    /// Reads the event, excluding writers for the duration. A crash captured while `f` runs is
    /// abandoned, so keep `f` short.
    pub fn inspect<R>(&self, f: impl FnOnce(&Event) -> R) -> R {
        self.event.write(|event| f(event.as_ref()))
    }

    /// Writes the event as it stands, for the handled-error path. Failures are logged and the
    /// event is dropped.
    ///
    /// Only the copy is taken inside a write section; the file is written from the copy.
    pub fn persist_event(&self) -> bool {
        let copy = self.inspect(|event| Box::new(event.clone()));
        let written = snapshot::write_file(self.path.as_c_str(), &self.header, &copy, None);
        match written {
            Ok(()) => {
                debug!(path = %self.path.as_path().display(), "Persisted event snapshot");
                true
            }
            Err(error) => {
                warn!(
                    path = %self.path.as_path().display(),
                    %error,
                    "Failed to persist event snapshot"
                );
                false
            }
        }
    }

    /// Marks the start of crash handling. Returns `None` if a crash is already being handled, so
    /// at most one [CrashContext] ever exists. The flag stays set: the process is not expected
    /// to continue.
    ///
    /// Async-signal-safe.
    pub fn enter_crash_handling(&self) -> Option<CrashContext<'_>> {
        if self.handling_crash.swap(true, Ordering::AcqRel) {
            return None;
        }
        // SAFETY: the flag was clear, so no other reference to the scratch exists.
        let scratch = unsafe { &mut **self.scratch.get() };
        Some(CrashContext { env: self, scratch })
    }
}

/// Access to the environment from inside a crash signal handler.
///
/// Every method is async-signal-safe: nothing here allocates, locks, or logs.
pub struct CrashContext<'a> {
    env: &'a Environment,
    scratch: &'a mut CrashScratch,
}

impl CrashContext<'_> {
    /// The error written in place of the event's own error block.
    pub fn error_mut(&mut self) -> &mut ErrorInfo {
        &mut self.scratch.error
    }

    /// Device time of the crash, in seconds since the epoch.
    pub fn set_time(&mut self, seconds: i64) {
        self.scratch.time = seconds;
    }

    pub fn release_policy(&self) -> ReleasePolicy {
        ReleasePolicy::Deferred
    }

    /// Writes the event, marked unhandled and carrying the crash error, to the configured path.
    ///
    /// The event is read without blocking. If a writer was active when the capture started or
    /// began one before it finished, the capture is abandoned and any partial file removed. It is
    /// never retried: the writer may be the thread this handler interrupted.
    pub fn capture(&mut self) -> CaptureOutcome {
        let lock = self.env.event.lock();
        let token = lock.optimistic_read();
        if !lock.validate(token) {
            return CaptureOutcome::Abandoned;
        }
        // SAFETY: only read; the result is discarded unless the token still validates below.
        // Fixed-width fields may be torn but stay in bounds. The feature flag trailer follows heap
        // pointers, so it is only written if the token still validates right before it. A writer
        // that reallocates a flag after that check can still leave the handler reading freed
        // memory; that window is accepted.
        let event: &Event = unsafe { self.env.event.read_unsynchronized() };
        let still_valid = || lock.validate(token);
        let overrides = CrashOverrides {
            error: &self.scratch.error,
            time: self.scratch.time,
            still_valid: &still_valid,
        };
        let path = self.env.path.as_c_str();
        let written = snapshot::write_file(path, &self.env.header, event, Some(&overrides));

        if !lock.validate(token) {
            unlink(path);
            return CaptureOutcome::Abandoned;
        }
        match written {
            Ok(()) => CaptureOutcome::Persisted,
            Err(error) => {
                if !matches!(error, SnapshotError::Open(_)) {
                    unlink(path);
                }
                CaptureOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Breadcrumb, BreadcrumbType, Severity, StackFrame};
    use crate::snapshot::deserialize_from_file;
    use crate::test_utils::{sample_event, TestInstance};

    fn config(dir: &tempfile::TempDir) -> CaptureConfiguration {
        CaptureConfiguration::new(dir.path().join("event.crash"), "build".to_string()).unwrap()
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_crash_capture_persists_overrides() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let env = Environment::from_event(&config(&dir), sample_event())?;
        env.update(|event, _| {
            event.add_breadcrumb(Breadcrumb::new(BreadcrumbType::Process, "last", ""))
        });

        let mut crash = env.enter_crash_handling().unwrap();
        crash.error_mut().set("SIGSEGV", "Segmentation violation", "c");
        crash.error_mut().push_frame(StackFrame::test_instance(9));
        crash.set_time(1_600_000_000);
        assert_eq!(crash.capture(), CaptureOutcome::Persisted);

        let decoded = deserialize_from_file(env.event_path())?;
        assert_eq!(decoded.error.error_class, "SIGSEGV");
        assert_eq!(decoded.error.frames(), &[StackFrame::test_instance(9)]);
        assert_eq!(decoded.severity, Severity::Error);
        assert!(decoded.unhandled);
        assert_eq!(decoded.unhandled_events, 2);
        assert_eq!(decoded.device.time, 1_600_000_000);
        assert_eq!(decoded.breadcrumbs.len(), 3);
        // The shared event is untouched.
        env.inspect(|event| {
            assert_eq!(event.error.error_class, "SIGBUS");
            assert!(!event.unhandled);
        });
        Ok(())
    }

    #[test]
    fn test_single_crash_context() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let env = Environment::new(&config(&dir))?;
        assert_eq!(env.release_policy(), ReleasePolicy::Immediate);
        let crash = env.enter_crash_handling();
        assert!(crash.is_some());
        assert!(env.enter_crash_handling().is_none());
        assert!(env.is_handling_crash());
        assert_eq!(env.release_policy(), ReleasePolicy::Deferred);
        env.update(|_, policy| assert_eq!(policy, ReleasePolicy::Deferred));
        Ok(())
    }

    #[test]
    fn test_capture_abandoned_during_write() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let env = Environment::new(&config(&dir))?;
        // Simulates a handler interrupting a thread inside a write section.
        env.event.lock().acquire_write();
        let mut crash = env.enter_crash_handling().unwrap();
        assert_eq!(crash.capture(), CaptureOutcome::Abandoned);
        assert!(!env.event_path().exists());
        env.event.lock().release_write();
        Ok(())
    }

    #[test]
    fn test_capture_failure_reported() -> anyhow::Result<()> {
        let config = CaptureConfiguration::new(
            "/nonexistent-dir/event.crash".into(),
            "build".to_string(),
        )?;
        let env = Environment::new(&config)?;
        let mut crash = env.enter_crash_handling().unwrap();
        assert_eq!(
            crash.capture(),
            CaptureOutcome::Failed(SnapshotError::Open(libc::ENOENT))
        );
        assert!(!env.persist_event());
        Ok(())
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_capture_races_writer() -> anyhow::Result<()> {
        const CAPTURES: usize = 200;
        let dir = tempfile::tempdir()?;
        let env = Environment::from_event(&config(&dir), sample_event())?;
        let done = AtomicBool::new(false);

        // Each capture is checked while the writer runs, and nothing in the loop may panic
        // before the writer is told to stop.
        let outcomes = std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut counter = 0u64;
                while !done.load(Ordering::Relaxed) {
                    counter += 1;
                    let value = counter.to_string();
                    env.update(|event, _| {
                        event.set_context(&value);
                        event.set_grouping_hash(&value);
                    });
                }
            });

            let mut outcomes = Vec::with_capacity(CAPTURES);
            if let Some(mut crash) = env.enter_crash_handling() {
                for _ in 0..CAPTURES {
                    let outcome = crash.capture();
                    let consistent = match outcome {
                        CaptureOutcome::Persisted => {
                            let decoded = deserialize_from_file(env.event_path());
                            let _ = std::fs::remove_file(env.event_path());
                            decoded.is_ok_and(|event| event.context == event.grouping_hash)
                        }
                        _ => !env.event_path().exists(),
                    };
                    outcomes.push((outcome, consistent));
                }
            }
            done.store(true, Ordering::Relaxed);
            outcomes
        });

        assert_eq!(outcomes.len(), CAPTURES);
        let mut persisted = 0;
        let mut abandoned = 0;
        for (outcome, consistent) in outcomes {
            match outcome {
                CaptureOutcome::Persisted => persisted += 1,
                CaptureOutcome::Abandoned => abandoned += 1,
                CaptureOutcome::Failed(error) => panic!("capture failed: {error}"),
            }
            assert!(consistent, "{outcome:?} left a torn or stray snapshot");
        }
        assert_eq!(persisted + abandoned, CAPTURES);
        Ok(())
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_persist_holds_lock_only_for_copy() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let env = Environment::from_event(&config(&dir), sample_event())?;
        let token = env.event.lock().optimistic_read();
        assert!(env.persist_event());
        // One write section, for the copy.
        assert!(env.event.lock().validate(token + 2));
        let decoded = deserialize_from_file(env.event_path())?;
        env.inspect(|event| assert_eq!(*decoded, *event));
        Ok(())
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_persist_handled_event() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let env = Environment::from_event(&config(&dir), sample_event())?;
        env.update(|event, policy| {
            event.set_severity(Severity::Warning);
            event.set_feature_flag("checkout", Some("v3"), policy);
        });
        assert!(env.persist_event());
        let decoded = deserialize_from_file(env.event_path())?;
        assert_eq!(decoded.severity, Severity::Warning);
        assert_eq!(
            decoded.feature_flags.get("checkout").unwrap().variant.as_deref(),
            Some("v3")
        );
        env.inspect(|event| assert_eq!(*decoded, *event));
        Ok(())
    }
}
