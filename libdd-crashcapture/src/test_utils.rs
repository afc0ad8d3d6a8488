// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::event::{
    Breadcrumb, BreadcrumbType, Event, MetadataValue, ReleasePolicy, StackFrame,
};

pub trait TestInstance {
    fn test_instance(seed: u64) -> Self;
}

impl TestInstance for StackFrame {
    fn test_instance(seed: u64) -> Self {
        let base = 0x7f00_0000 + (seed as usize) * 0x100;
        Self {
            frame_address: base + 0x34,
            symbol_address: base,
            load_address: 0x7f00_0000,
            line_number: seed as usize,
            filename: format!("libfoo{seed}.so").as_str().into(),
            method: format!("function_{seed}").as_str().into(),
        }
    }
}

impl TestInstance for Breadcrumb {
    fn test_instance(seed: u64) -> Self {
        let mut crumb = Breadcrumb::new(
            BreadcrumbType::Log,
            &format!("breadcrumb {seed}"),
            "2019-09-19T13:00:00.000Z",
        );
        crumb.add_metadata("seed", &seed.to_string());
        crumb
    }
}

/// An event with every block populated, including the example from the upload contract.
pub fn sample_event() -> Box<Event> {
    let mut event = Event::new();
    event.notifier.name.set("Native Notifier");
    event.notifier.version.set("1.4.0");
    event.notifier.url.set("https://example.com/notifier");
    event.app.id.set("com.example.foo");
    event.app.version.set("2.0.52");
    event.app.version_code = 57;
    event.app.release_stage.set("production");
    event.app.app_type.set("android");
    event.app.duration = 3000;
    event.app.in_foreground = true;
    event.app.is_launching = true;
    event.app.binary_arch.set("arm64");
    event.device.set_cpu_abis(["arm64-v8a", "armeabi-v7a"]);
    event.device.time = 1_568_898_000;
    event.device.total_memory = 4 << 30;
    event.device.api_level = 29;
    event.device.os_name.set("android");
    event.device.os_version.set("10");
    event.device.manufacturer.set("Google");
    event.device.model.set("Pixel 3");
    event.set_user("u1", "u1@example.com", "Ursula");
    event.set_error("SIGBUS", "Bus error (bad memory access)", "c");
    for seed in 0..3 {
        event.push_stack_frame(StackFrame::test_instance(seed));
    }

    let mut crumb = Breadcrumb::new(
        BreadcrumbType::State,
        "decrease torque",
        "2019-09-19T13:00:00.000Z",
    );
    crumb.add_metadata("from", "7");
    event.add_breadcrumb(crumb);
    event.add_breadcrumb(Breadcrumb::new(
        BreadcrumbType::User,
        "enable blasters",
        "2019-09-19T13:00:01.000Z",
    ));

    event.add_metadata_string("custom", "mode", "turbo");
    event.add_metadata_number("custom", "speed", 9.5);
    event.add_metadata_bool("custom", "enabled", true);
    event
        .metadata
        .insert("custom", "nothing", MetadataValue::None);
    event.start_session("f1ab", "2019-09-19T12:59:00Z", 1, 1);
    event.set_grouping_hash("hash");
    event.set_api_key("0123456789abcdef0123456789abcdef");
    event.set_context("MainActivity");
    event.set_feature_flag("checkout", Some("v2"), ReleasePolicy::Immediate);
    event.set_feature_flag("dark_mode", None, ReleasePolicy::Immediate);
    event
}
