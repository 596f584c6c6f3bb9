// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shapes returned by LLM Dispatch (§4.5).

/// Options accepted by [`crate::dispatch::LlmDispatch::execute_task`].
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub working_directory: String,
    pub session_id: Option<String>,
    pub allowed_tools: Vec<String>,
    pub max_retries: u32,
}

/// The outcome of a single coding-agent invocation, win or lose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub success: bool,
    pub output: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self { success: false, output: String::new(), input_tokens: 0, output_tokens: 0, duration_ms, error: Some(error.into()) }
    }
}
