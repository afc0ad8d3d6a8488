// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::sigsafe::{EventPath, EVENT_PATH_MAX};
use crate::snapshot::OS_BUILD_LEN;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedConfiguration")]
pub struct CaptureConfiguration {
    // Where a crash snapshot is written; chosen by the caller's file-location policy
    event_path: PathBuf,
    // Recorded in every snapshot header
    os_build: String,
}

/// Deserialized fields, validated through [CaptureConfiguration::new].
#[derive(Deserialize)]
struct UncheckedConfiguration {
    event_path: PathBuf,
    os_build: String,
}

impl TryFrom<UncheckedConfiguration> for CaptureConfiguration {
    type Error = anyhow::Error;

    fn try_from(fields: UncheckedConfiguration) -> anyhow::Result<Self> {
        Self::new(fields.event_path, fields.os_build)
    }
}

impl CaptureConfiguration {
    pub fn new(event_path: PathBuf, os_build: String) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !event_path.as_os_str().is_empty(),
            "Event path must not be empty"
        );
        // The path is copied into a fixed buffer so it can be opened from a signal handler.
        anyhow::ensure!(
            EventPath::new(&event_path).is_some(),
            "Event path {} must be shorter than {EVENT_PATH_MAX} bytes and free of NUL bytes",
            event_path.display()
        );
        anyhow::ensure!(
            os_build.len() < OS_BUILD_LEN,
            "OS build {os_build:?} does not fit the {OS_BUILD_LEN} byte snapshot header"
        );
        Ok(Self {
            event_path,
            os_build,
        })
    }

    pub fn event_path(&self) -> &Path {
        &self.event_path
    }

    pub fn os_build(&self) -> &str {
        &self.os_build
    }

    pub(crate) fn fixed_event_path(&self) -> anyhow::Result<EventPath> {
        EventPath::new(&self.event_path).ok_or_else(|| {
            anyhow::anyhow!("Event path {} cannot be used", self.event_path.display())
        })
    }
}
