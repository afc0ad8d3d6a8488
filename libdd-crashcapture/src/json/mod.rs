// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Projection of an [Event] onto the upload document.
//!
//! The payload types borrow text from the event; nothing here mutates it. Addresses and device
//! time go through [crate::sigsafe::format] so the projection renders them the same way on
//! every platform.

use crate::event::{BreadcrumbType, Event, MetadataValue, Notifier, Severity, StackFrame};
use crate::sigsafe::format::{format_hex, format_i64, format_iso8601, I64_DIGITS_MAX, ISO8601_LEN};
use crate::sigsafe::FixedStr;
use anyhow::Context;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;

/// Metadata section that receives app fields without a slot of their own in the app block.
const APP_SECTION: &str = "app";

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload<'a> {
    pub app: AppPayload<'a>,
    pub device: DevicePayload<'a>,
    pub user: UserPayload<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping_hash: Option<&'a str>,
    pub severity: Severity,
    pub unhandled: bool,
    pub severity_reason: SeverityReason<'a>,
    pub exceptions: Vec<ExceptionPayload<'a>>,
    pub breadcrumbs: Vec<BreadcrumbPayload<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionPayload<'a>>,
    pub meta_data: BTreeMap<&'a str, BTreeMap<&'a str, serde_json::Value>>,
    pub feature_flags: Vec<FeatureFlagPayload<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_stage: Option<&'a str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub app_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
    pub version_code: i64,
    #[serde(rename = "buildUUID", skip_serializing_if = "Option::is_none")]
    pub build_uuid: Option<&'a str>,
    pub duration: i64,
    pub duration_in_foreground: i64,
    pub in_foreground: bool,
    pub is_launching: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_arch: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevicePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<&'a str>,
    pub total_memory: i64,
    pub jailbroken: bool,
    pub cpu_abi: Vec<&'a str>,
    /// ISO-8601, seconds precision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub runtime_versions: RuntimeVersions<'a>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_api_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_build: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct UserPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SeverityReason<'a> {
    #[serde(rename = "type")]
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<&'static str, &'a str>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionPayload<'a> {
    pub error_class: &'a str,
    pub message: &'a str,
    #[serde(rename = "type")]
    pub error_type: &'a str,
    pub stacktrace: Vec<FramePayload<'a>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload<'a> {
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<&'a str>,
    pub line_number: usize,
    pub frame_address: String,
    pub symbol_address: String,
    pub load_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BreadcrumbPayload<'a> {
    pub timestamp: &'a str,
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: BreadcrumbType,
    pub meta_data: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload<'a> {
    pub id: &'a str,
    pub started_at: &'a str,
    pub events: SessionEvents,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SessionEvents {
    pub handled: i32,
    pub unhandled: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlagPayload<'a> {
    pub feature_flag: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct NotifierPayload<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub url: &'a str,
}

/// Upload envelope: one or more events from the same notifier.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'a str>,
    pub notifier: NotifierPayload<'a>,
    pub events: Vec<EventPayload<'a>>,
}

impl<'a> Report<'a> {
    /// Wraps `event`, taking the api key and notifier from it.
    pub fn for_event(event: &'a Event) -> Self {
        Self {
            api_key: text(&event.api_key),
            notifier: project_notifier(&event.notifier),
            events: vec![project_event(event)],
        }
    }
}

fn text<const N: usize>(value: &FixedStr<N>) -> Option<&str> {
    (!value.is_empty()).then(|| value.as_str())
}

fn hex_address(address: usize) -> String {
    let mut buf = [0u8; 2 + 16 + 1];
    buf[..2].copy_from_slice(b"0x");
    let len = format_hex(address as u64, 1, &mut buf[2..]);
    String::from_utf8_lossy(&buf[..2 + len]).into_owned()
}

fn iso8601(seconds: i64) -> String {
    let mut buf = [0u8; ISO8601_LEN + 1];
    let len = format_iso8601(seconds, &mut buf);
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

fn decimal(value: i64) -> String {
    let mut buf = [0u8; I64_DIGITS_MAX];
    let len = format_i64(value, &mut buf);
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

fn metadata_value(value: &MetadataValue) -> serde_json::Value {
    match value {
        MetadataValue::None => serde_json::Value::Null,
        MetadataValue::Bool(flag) => serde_json::Value::Bool(*flag),
        MetadataValue::Text(text) => serde_json::Value::String(text.to_string()),
        MetadataValue::Number(number) => serde_json::Number::from_f64(*number)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
    }
}

fn project_notifier(notifier: &Notifier) -> NotifierPayload<'_> {
    NotifierPayload {
        name: notifier.name.as_str(),
        version: notifier.version.as_str(),
        url: notifier.url.as_str(),
    }
}

fn project_frame(frame: &StackFrame) -> FramePayload<'_> {
    FramePayload {
        method: frame.method.as_str(),
        file: text(&frame.filename),
        line_number: frame.line_number,
        frame_address: hex_address(frame.frame_address),
        symbol_address: hex_address(frame.symbol_address),
        load_address: hex_address(frame.load_address),
    }
}

pub fn project_event(event: &Event) -> EventPayload<'_> {
    let app = &event.app;
    let device = &event.device;

    let mut meta_data: BTreeMap<&str, BTreeMap<&str, serde_json::Value>> = BTreeMap::new();
    for entry in event.metadata.iter() {
        meta_data
            .entry(entry.section.as_str())
            .or_default()
            .insert(entry.name.as_str(), metadata_value(&entry.value));
    }
    if let Some(screen) = text(&app.active_screen) {
        meta_data
            .entry(APP_SECTION)
            .or_default()
            .insert("activeScreen", serde_json::Value::String(screen.to_owned()));
    }

    let severity_reason = if event.unhandled {
        SeverityReason {
            reason: "signal",
            attributes: Some(BTreeMap::from([(
                "signalType",
                event.error.error_class.as_str(),
            )])),
        }
    } else {
        SeverityReason {
            reason: "handledException",
            attributes: None,
        }
    };

    EventPayload {
        app: AppPayload {
            id: text(&app.id),
            release_stage: text(&app.release_stage),
            app_type: text(&app.app_type),
            version: text(&app.version),
            version_code: app.version_code,
            build_uuid: text(&app.build_uuid),
            duration: app.duration,
            duration_in_foreground: app.duration_in_foreground,
            in_foreground: app.in_foreground,
            is_launching: app.is_launching,
            binary_arch: text(&app.binary_arch),
        },
        device: DevicePayload {
            os_name: text(&device.os_name),
            id: text(&device.id),
            locale: text(&device.locale),
            os_version: text(&device.os_version),
            manufacturer: text(&device.manufacturer),
            model: text(&device.model),
            orientation: text(&device.orientation),
            total_memory: device.total_memory,
            jailbroken: device.jailbroken,
            cpu_abi: device.cpu_abis().iter().map(FixedStr::as_str).collect(),
            time: (device.time != 0).then(|| iso8601(device.time)),
            runtime_versions: RuntimeVersions {
                android_api_level: (device.api_level != 0)
                    .then(|| decimal(i64::from(device.api_level))),
                os_build: text(&device.os_build),
            },
        },
        user: UserPayload {
            id: text(&event.user.id),
            email: text(&event.user.email),
            name: text(&event.user.name),
        },
        context: text(&event.context),
        grouping_hash: text(&event.grouping_hash),
        severity: event.severity,
        unhandled: event.unhandled,
        severity_reason,
        exceptions: vec![ExceptionPayload {
            error_class: event.error.error_class.as_str(),
            message: event.error.error_message.as_str(),
            error_type: event.error.error_type.as_str(),
            stacktrace: event.error.frames().iter().map(project_frame).collect(),
        }],
        breadcrumbs: event
            .breadcrumbs
            .iter()
            .map(|crumb| BreadcrumbPayload {
                timestamp: crumb.timestamp.as_str(),
                name: crumb.name.as_str(),
                kind: crumb.kind,
                meta_data: crumb
                    .metadata()
                    .map(|pair| (pair.key.as_str(), pair.value.as_str()))
                    .collect(),
            })
            .collect(),
        session: event.has_session().then(|| SessionPayload {
            id: event.session_id.as_str(),
            started_at: event.session_start.as_str(),
            events: SessionEvents {
                handled: event.handled_events,
                unhandled: event.unhandled_events,
            },
        }),
        meta_data,
        feature_flags: event
            .feature_flags
            .iter()
            .map(|flag| FeatureFlagPayload {
                feature_flag: &flag.name,
                variant: flag.variant.as_deref(),
            })
            .collect(),
        api_key: text(&event.api_key),
    }
}

pub fn to_json_string(event: &Event) -> anyhow::Result<String> {
    serde_json::to_string(&project_event(event)).context("serializing event payload")
}

/// JSON schema of the event payload, for consumers validating uploads.
pub fn event_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(EventPayload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_event;
    use serde_json::json;

    #[test]
    fn test_projection_keys() -> anyhow::Result<()> {
        let event = sample_event();
        let value: serde_json::Value = serde_json::from_str(&to_json_string(&event)?)?;

        assert_eq!(value["app"]["version"], "2.0.52");
        assert_eq!(value["app"]["versionCode"], 57);
        assert_eq!(value["app"]["isLaunching"], true);
        assert_eq!(value["app"]["type"], "android");
        assert_eq!(value["device"]["cpuAbi"], json!(["arm64-v8a", "armeabi-v7a"]));
        assert_eq!(value["device"]["time"], "2019-09-19T13:00:00Z");
        assert_eq!(value["device"]["runtimeVersions"]["androidApiLevel"], "29");
        assert_eq!(value["user"]["name"], "Ursula");
        assert_eq!(value["context"], "MainActivity");
        assert_eq!(value["groupingHash"], "hash");
        assert_eq!(value["severity"], "error");
        assert_eq!(value["apiKey"], "0123456789abcdef0123456789abcdef");

        let exception = &value["exceptions"][0];
        assert_eq!(exception["errorClass"], "SIGBUS");
        assert_eq!(exception["type"], "c");
        let frame = &exception["stacktrace"][1];
        assert_eq!(frame["method"], "function_1");
        assert_eq!(frame["frameAddress"], "0x7f000134");
        assert_eq!(frame["loadAddress"], "0x7f000000");

        let crumbs = value["breadcrumbs"].as_array().unwrap();
        assert_eq!(crumbs.len(), 2);
        assert_eq!(crumbs[0]["name"], "decrease torque");
        assert_eq!(crumbs[0]["type"], "state");
        assert_eq!(crumbs[0]["metaData"], json!({"from": "7"}));
        assert_eq!(crumbs[1]["type"], "user");

        assert_eq!(
            value["session"],
            json!({
                "id": "f1ab",
                "startedAt": "2019-09-19T12:59:00Z",
                "events": {"handled": 1, "unhandled": 1}
            })
        );
        assert_eq!(
            value["metaData"]["custom"],
            json!({"mode": "turbo", "speed": 9.5, "enabled": true, "nothing": null})
        );
        assert_eq!(
            value["featureFlags"],
            json!([{"featureFlag": "checkout", "variant": "v2"}, {"featureFlag": "dark_mode"}])
        );
        Ok(())
    }

    #[test]
    fn test_empty_fields_are_omitted() -> anyhow::Result<()> {
        let event = Event::new();
        let value = serde_json::to_value(project_event(&event))?;
        assert!(value.get("session").is_none());
        assert!(value.get("context").is_none());
        assert!(value.get("apiKey").is_none());
        assert!(value["app"].get("version").is_none());
        assert!(value["device"].get("time").is_none());
        assert_eq!(value["user"], json!({}));
        assert_eq!(value["severityReason"], json!({"type": "handledException"}));
        Ok(())
    }

    #[test]
    fn test_unhandled_and_non_finite() -> anyhow::Result<()> {
        let mut event = Event::new();
        event.set_error("SIGSEGV", "", "c");
        event.set_unhandled(true);
        event.add_metadata_number("custom", "nan", f64::NAN);
        event.app.active_screen.set("Home");
        let value = serde_json::to_value(project_event(&event))?;
        assert_eq!(
            value["severityReason"],
            json!({"type": "signal", "attributes": {"signalType": "SIGSEGV"}})
        );
        assert_eq!(value["metaData"]["custom"]["nan"], serde_json::Value::Null);
        assert_eq!(value["metaData"]["app"]["activeScreen"], "Home");
        Ok(())
    }

    #[test]
    fn test_report_envelope() -> anyhow::Result<()> {
        let event = sample_event();
        let value = serde_json::to_value(Report::for_event(&event))?;
        assert_eq!(value["apiKey"], "0123456789abcdef0123456789abcdef");
        assert_eq!(value["notifier"]["name"], "Native Notifier");
        assert_eq!(value["events"].as_array().unwrap().len(), 1);
        Ok(())
    }

    #[test]
    fn test_schema_names_wire_keys() -> anyhow::Result<()> {
        let schema = serde_json::to_value(event_schema())?;
        let properties = &schema["properties"];
        for key in ["app", "device", "exceptions", "breadcrumbs", "metaData", "featureFlags"] {
            assert!(properties.get(key).is_some(), "missing {key}");
        }
        Ok(())
    }
}
