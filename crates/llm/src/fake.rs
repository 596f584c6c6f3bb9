// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory [`LlmDispatch`] for exercising the reactor and review loop
//! without spawning a subprocess, mirroring `cco-vcs`'s `FakeGateway`.

use async_trait::async_trait;
use cco_core::Result;
use parking_lot::Mutex;

use crate::dispatch::LlmDispatch;
use crate::types::{TaskOptions, TaskResult};

#[derive(Debug, Default)]
struct State {
    /// Scripted results returned in order, one per `execute_task`/
    /// `resume_session` call. When exhausted, calls return a generic
    /// success with empty output.
    scripted: Vec<Result<TaskResult>>,
    prompts_seen: Vec<String>,
    rotations: u32,
}

/// A scripted LLM dispatch: tests push expected results in call order and
/// assert on the prompts the reactor sent.
#[derive(Default)]
pub struct FakeDispatch {
    state: Mutex<State>,
}

impl FakeDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_success(&self, output: impl Into<String>) {
        self.state.lock().scripted.push(Ok(TaskResult {
            success: true,
            output: output.into(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            error: None,
        }));
    }

    pub fn push_failure(&self, error: impl Into<String>) {
        self.state.lock().scripted.push(Ok(TaskResult::failure(error, 0)));
    }

    pub fn push_err(&self, err: cco_core::Error) {
        self.state.lock().scripted.push(Err(err));
    }

    pub fn prompts_seen(&self) -> Vec<String> {
        self.state.lock().prompts_seen.clone()
    }

    pub fn rotations(&self) -> u32 {
        self.state.lock().rotations
    }

    fn next(&self, prompt: &str) -> Result<TaskResult> {
        let mut guard = self.state.lock();
        guard.prompts_seen.push(prompt.to_string());
        if guard.scripted.is_empty() {
            return Ok(TaskResult { success: true, output: String::new(), input_tokens: 0, output_tokens: 0, duration_ms: 0, error: None });
        }
        guard.scripted.remove(0)
    }
}

#[async_trait]
impl LlmDispatch for FakeDispatch {
    async fn execute_task(&self, prompt: &str, _opts: &TaskOptions) -> Result<TaskResult> {
        self.next(prompt)
    }

    async fn generate_changes_summary(&self, _session_id: &str, files: &[String]) -> Result<String> {
        let result = self.next(&format!("summarize: {}", files.join(",")))?;
        Ok(result.output)
    }

    async fn resume_session(&self, _session_id: &str, feedback: &str) -> Result<TaskResult> {
        self.next(feedback)
    }

    fn rotate_credentials(&self) {
        self.state.lock().rotations += 1;
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
