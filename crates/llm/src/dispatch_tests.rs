// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cco_core::{CredentialRing, CredentialSpec, SystemClock};

use super::*;

/// Writes an executable shell script standing in for the coding-agent
/// binary, so dispatch logic (rotation, retry, backoff) is exercised over
/// a real subprocess instead of a mocked trait.
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn credential(key: &str) -> CredentialSpec {
    CredentialSpec { api_key: Some(key.to_string()), env_api_key: None, env_auth_token: None, model: None, base_url: None }
}

fn opts(working_directory: &Path) -> TaskOptions {
    TaskOptions {
        working_directory: working_directory.to_string_lossy().into_owned(),
        session_id: None,
        allowed_tools: Vec::new(),
        max_retries: 3,
    }
}

#[tokio::test]
async fn execute_task_returns_success_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), "agent.sh", "echo hello-world");
    let ring = CredentialRing::new(vec![credential("k1")]).expect("ring");
    let dispatch = CodingAgentDispatch::new(script.to_string_lossy().into_owned(), ring, Arc::new(SystemClock));

    let result = dispatch.execute_task("do the thing", &opts(dir.path())).await.expect("execute task");
    assert!(result.success);
    assert!(result.output.contains("hello-world"));
}

#[tokio::test]
async fn execute_task_rotates_on_rate_limit_without_consuming_retries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(
        dir.path(),
        "agent.sh",
        r#"if [ "$ANTHROPIC_API_KEY" = "k1" ]; then echo "429 rate_limit" 1>&2; exit 1; fi
echo "success with $ANTHROPIC_API_KEY""#,
    );
    let ring = CredentialRing::new(vec![credential("k1"), credential("k2")]).expect("ring");
    let dispatch = CodingAgentDispatch::new(script.to_string_lossy().into_owned(), ring, Arc::new(SystemClock));

    let result = dispatch.execute_task("do the thing", &opts(dir.path())).await.expect("execute task");
    assert!(result.success);
    assert!(result.output.contains("success with k2"));
}

#[tokio::test]
async fn execute_task_fails_fast_on_authentication_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), "agent.sh", r#"echo "authentication failed" 1>&2; exit 1"#);
    let ring = CredentialRing::new(vec![credential("k1")]).expect("ring");
    let dispatch = CodingAgentDispatch::new(script.to_string_lossy().into_owned(), ring, Arc::new(SystemClock));

    let err = dispatch.execute_task("do the thing", &opts(dir.path())).await.expect_err("should fail");
    assert!(matches!(err, cco_core::Error::AuthenticationFailed(_)));
}

#[tokio::test]
async fn execute_task_retries_transient_failures_then_succeeds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let counter_path = dir.path().join("attempts");
    std::fs::write(&counter_path, "0").expect("seed counter");
    let script = write_script(
        dir.path(),
        "agent.sh",
        &format!(
            r#"count=$(cat "{path}")
count=$((count + 1))
echo "$count" > "{path}"
if [ "$count" -lt 3 ]; then echo "transient failure" 1>&2; exit 1; fi
echo "recovered after $count""#,
            path = counter_path.display()
        ),
    );
    let ring = CredentialRing::new(vec![credential("k1")]).expect("ring");
    let dispatch = CodingAgentDispatch::new(script.to_string_lossy().into_owned(), ring, Arc::new(SystemClock));

    let result = dispatch.execute_task("do the thing", &opts(dir.path())).await.expect("execute task");
    assert!(result.success);
    assert!(result.output.contains("recovered after 3"));
}

#[tokio::test]
async fn execute_task_gives_up_after_max_retries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), "agent.sh", r#"echo "still broken" 1>&2; exit 1"#);
    let ring = CredentialRing::new(vec![credential("k1")]).expect("ring");
    let dispatch = CodingAgentDispatch::new(script.to_string_lossy().into_owned(), ring, Arc::new(SystemClock));

    let mut task_opts = opts(dir.path());
    task_opts.max_retries = 2;
    let result = dispatch.execute_task("do the thing", &task_opts).await.expect("execute task returns Ok with a failed result");
    assert!(!result.success);
    assert!(result.error.expect("error message").contains("still broken"));
}

#[tokio::test]
async fn generate_changes_summary_returns_agent_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), "agent.sh", "echo the summary text");
    let ring = CredentialRing::new(vec![credential("k1")]).expect("ring");
    let dispatch = CodingAgentDispatch::new(script.to_string_lossy().into_owned(), ring, Arc::new(SystemClock));

    let summary =
        dispatch.generate_changes_summary("session-1", &["a.rs".to_string()]).await.expect("generate changes summary");
    assert!(summary.contains("the summary text"));
}
