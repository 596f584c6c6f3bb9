// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM Dispatch (§4.5): runs the configured coding-agent executable as a
//! subprocess, rotating through the Credential Ring on rate limits and
//! retrying other transient failures with backoff.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use cco_core::{is_authentication_failure_signature, is_rate_limit_signature, Clock, CredentialRing, Error, Result};
use parking_lot::Mutex;
use tokio::process::Command;

use crate::types::{TaskOptions, TaskResult};

#[async_trait]
pub trait LlmDispatch: Send + Sync {
    async fn execute_task(&self, prompt: &str, opts: &TaskOptions) -> Result<TaskResult>;

    /// A dedicated prompt summarizing the changes a session produced,
    /// used to compose worker/EM PR bodies (§4.1.3).
    async fn generate_changes_summary(&self, session_id: &str, files: &[String]) -> Result<String>;

    /// Resumes a prior session with review feedback as the new prompt
    /// (§4.1.2's review-feedback loop).
    async fn resume_session(&self, session_id: &str, feedback: &str) -> Result<TaskResult>;

    /// Advances the credential ring by one position. Callers reach for this
    /// between retry attempts of a call that doesn't go through
    /// `dispatch_with_retry`'s own rate-limit detection, e.g. the Harvester
    /// retry in `run_analysis`/`run_breakdown` (§4.1).
    fn rotate_credentials(&self);
}

/// Dispatches tasks to a coding-agent CLI executable, one subprocess per
/// call. Rate-limit rotation does not consume `opts.max_retries`; a ring
/// of size one rotates at most once per task before falling back to
/// ordinary retry-with-backoff, so it cannot loop forever (§8).
pub struct CodingAgentDispatch {
    executable: String,
    ring: Mutex<CredentialRing>,
    clock: std::sync::Arc<dyn Clock>,
}

impl CodingAgentDispatch {
    pub fn new(executable: impl Into<String>, ring: CredentialRing, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self { executable: executable.into(), ring: Mutex::new(ring), clock }
    }

    fn current_auth(&self) -> Option<(String, Option<String>, Option<String>)> {
        let ring = self.ring.lock();
        let cred = ring.current();
        cred.resolve_auth().map(|auth| (auth, cred.model.clone(), cred.base_url.clone()))
    }

    async fn run_once(&self, args: &[String], opts: &TaskOptions) -> Result<TaskResult> {
        let (auth, model, base_url) =
            self.current_auth().ok_or_else(|| Error::Config("no credential in the ring resolved any auth material".into()))?;

        let mut command = Command::new(&self.executable);
        command.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if !opts.working_directory.is_empty() {
            command.current_dir(&opts.working_directory);
        }
        command.env("ANTHROPIC_API_KEY", &auth);
        if let Some(model) = &model {
            command.env("ANTHROPIC_MODEL", model);
        }
        if let Some(base_url) = &base_url {
            command.env("ANTHROPIC_BASE_URL", base_url);
        }

        let started = self.clock.now();
        let output = command.output().await.map_err(|e| Error::Transient(format!("failed to spawn coding agent: {e}")))?;
        let duration_ms = (self.clock.now() - started).num_milliseconds().max(0) as u64;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let message = if stderr.trim().is_empty() { stdout.clone() } else { stderr };
            return Ok(TaskResult::failure(message, duration_ms));
        }

        let (input_tokens, output_tokens) = parse_token_usage(&stdout);
        Ok(TaskResult { success: true, output: stdout, input_tokens, output_tokens, duration_ms, error: None })
    }

    async fn dispatch_with_retry(&self, args: Vec<String>, opts: &TaskOptions) -> Result<TaskResult> {
        let ring_len = { self.ring.lock().len() as u32 };
        let mut retries_used = 0u32;
        let mut rotations_used = 0u32;

        loop {
            let result = self.run_once(&args, opts).await?;
            if result.success {
                return Ok(result);
            }
            let message = result.error.clone().unwrap_or_default();

            if is_rate_limit_signature(&message) && rotations_used < ring_len {
                rotations_used += 1;
                self.ring.lock().rotate_on_rate_limit();
                continue;
            }
            if is_authentication_failure_signature(&message) {
                return Err(Error::AuthenticationFailed(message));
            }

            retries_used += 1;
            if retries_used >= opts.max_retries.max(1) {
                return Ok(result);
            }
            tokio::time::sleep(backoff_delay(retries_used)).await;
        }
    }
}

#[async_trait]
impl LlmDispatch for CodingAgentDispatch {
    async fn execute_task(&self, prompt: &str, opts: &TaskOptions) -> Result<TaskResult> {
        let mut args = vec!["--print".to_string(), prompt.to_string()];
        if !opts.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(opts.allowed_tools.join(","));
        }
        if let Some(session_id) = &opts.session_id {
            args.push("--session-id".to_string());
            args.push(session_id.clone());
        }
        self.dispatch_with_retry(args, opts).await
    }

    async fn generate_changes_summary(&self, session_id: &str, files: &[String]) -> Result<String> {
        let prompt = format!(
            "Summarize the changes made in this session to the following files, in two to four sentences: {}",
            files.join(", ")
        );
        let opts = TaskOptions { session_id: Some(session_id.to_string()), max_retries: 3, ..Default::default() };
        let result = self.dispatch_with_retry(vec!["--print".to_string(), prompt, "--resume".to_string(), session_id.to_string()], &opts).await?;
        if result.success {
            Ok(result.output)
        } else {
            Err(Error::Transient(result.error.unwrap_or_else(|| "changes summary failed".to_string())))
        }
    }

    async fn resume_session(&self, session_id: &str, feedback: &str) -> Result<TaskResult> {
        let opts = TaskOptions { session_id: Some(session_id.to_string()), max_retries: 3, ..Default::default() };
        self.dispatch_with_retry(
            vec!["--print".to_string(), feedback.to_string(), "--resume".to_string(), session_id.to_string()],
            &opts,
        )
        .await
    }

    fn rotate_credentials(&self) {
        self.ring.lock().rotate_on_rate_limit();
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = Duration::from_secs(5).saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
    exp.min(Duration::from_secs(30))
}

/// Best-effort extraction of token counts from the agent's stdout, which
/// emits a trailing `{"usage":{"input_tokens":N,"output_tokens":N}}` line
/// when run with `--print`. Absence is not an error; callers just see 0s.
fn parse_token_usage(stdout: &str) -> (u64, u64) {
    for line in stdout.lines().rev() {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line.trim()) {
            if let Some(usage) = value.get("usage") {
                let input = usage.get("input_tokens").and_then(serde_json::Value::as_u64).unwrap_or(0);
                let output = usage.get("output_tokens").and_then(serde_json::Value::as_u64).unwrap_or(0);
                return (input, output);
            }
        }
    }
    (0, 0)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
