// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::sigsafe::FixedStr;

/// Deepest stack kept for one error. Deeper frames are dropped.
pub const FRAMES_MAX: usize = 192;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackFrame {
    pub frame_address: usize,
    pub symbol_address: usize,
    pub load_address: usize,
    pub line_number: usize,
    pub filename: FixedStr<256>,
    pub method: FixedStr<256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorInfo {
    pub error_class: FixedStr<64>,
    pub error_message: FixedStr<256>,
    /// Which runtime produced the error, e.g. `c`.
    pub error_type: FixedStr<32>,
    pub(crate) frame_count: usize,
    pub(crate) stacktrace: [StackFrame; FRAMES_MAX],
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self {
            error_class: FixedStr::new(),
            error_message: FixedStr::new(),
            error_type: FixedStr::new(),
            frame_count: 0,
            stacktrace: [StackFrame::default(); FRAMES_MAX],
        }
    }
}

impl ErrorInfo {
    /// Replaces class, message and type, and drops the stack. Does not allocate.
    pub fn set(&mut self, error_class: &str, error_message: &str, error_type: &str) {
        self.error_class.set(error_class);
        self.error_message.set(error_message);
        self.error_type.set(error_type);
        self.clear_stack();
    }

    /// Appends a frame, innermost first. Returns false once the stack is full.
    pub fn push_frame(&mut self, frame: StackFrame) -> bool {
        if self.frame_count >= FRAMES_MAX {
            return false;
        }
        self.stacktrace[self.frame_count] = frame;
        self.frame_count += 1;
        true
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.stacktrace[..self.frame_count.min(FRAMES_MAX)]
    }

    pub fn clear_stack(&mut self) {
        self.stacktrace[..self.frame_count.min(FRAMES_MAX)].fill(StackFrame::default());
        self.frame_count = 0;
    }
}
