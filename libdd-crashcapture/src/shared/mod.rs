// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Settings shared by the capture and recovery paths

pub(crate) mod configuration;
