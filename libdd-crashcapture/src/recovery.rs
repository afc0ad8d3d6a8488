// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Picking up a snapshot left behind by a previous process.

use crate::event::Event;
use crate::json::Report;
use crate::snapshot::{deserialize_from_file, DecodeError};
use anyhow::Context;
use std::path::Path;
use tracing::{debug, warn};

/// Decodes and removes the snapshot at `path`.
///
/// Returns `Ok(None)` when there is nothing to recover. A snapshot that cannot be decoded is
/// logged and removed as well, so a corrupt file is not retried on every start.
pub fn take_pending_event(path: &Path) -> anyhow::Result<Option<Box<Event>>> {
    let event = match deserialize_from_file(path) {
        Ok(event) => {
            debug!(path = %path.display(), "Recovered event snapshot");
            Some(event)
        }
        Err(DecodeError::Missing) => return Ok(None),
        Err(error) => {
            warn!(path = %path.display(), %error, "Discarding unreadable event snapshot");
            None
        }
    };
    std::fs::remove_file(path)
        .with_context(|| format!("Failed to remove event snapshot {}", path.display()))?;
    Ok(event)
}

/// Like [take_pending_event], rendered as an upload document.
pub fn take_pending_report(path: &Path) -> anyhow::Result<Option<String>> {
    let Some(event) = take_pending_event(path)? else {
        return Ok(None);
    };
    let report = serde_json::to_string(&Report::for_event(&event))
        .context("Failed to serialize recovered event")?;
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigsafe::EventPath;
    use crate::snapshot::{serialize_to_file, SnapshotHeader};
    use crate::test_utils::sample_event;

    #[test]
    fn test_nothing_pending() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(take_pending_event(&dir.path().join("event.crash"))?.is_none());
        Ok(())
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_recovers_once() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("event.crash");
        let fixed = EventPath::new(&path).unwrap();
        let event = sample_event();
        assert!(serialize_to_file(
            fixed.as_c_str(),
            &SnapshotHeader::new("build"),
            &event
        ));

        let report = take_pending_report(&path)?.unwrap();
        let value: serde_json::Value = serde_json::from_str(&report)?;
        assert_eq!(value["events"][0]["app"]["version"], "2.0.52");
        assert!(!path.exists());
        assert!(take_pending_report(&path)?.is_none());
        Ok(())
    }

    #[test]
    fn test_corrupt_snapshot_removed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("event.crash");
        std::fs::write(&path, b"not a snapshot")?;
        assert!(take_pending_event(&path)?.is_none());
        assert!(!path.exists());
        Ok(())
    }
}
