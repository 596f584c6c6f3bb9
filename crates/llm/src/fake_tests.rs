// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn returns_scripted_results_in_order() {
    let fake = FakeDispatch::new();
    fake.push_success("first");
    fake.push_failure("second failed");

    let opts = TaskOptions::default();
    let first = fake.execute_task("prompt-a", &opts).await.expect("first call");
    assert!(first.success);
    assert_eq!(first.output, "first");

    let second = fake.execute_task("prompt-b", &opts).await.expect("second call");
    assert!(!second.success);
    assert_eq!(second.error.as_deref(), Some("second failed"));

    assert_eq!(fake.prompts_seen(), vec!["prompt-a".to_string(), "prompt-b".to_string()]);
}

#[tokio::test]
async fn defaults_to_empty_success_when_unscripted() {
    let fake = FakeDispatch::new();
    let result = fake.execute_task("anything", &TaskOptions::default()).await.expect("call");
    assert!(result.success);
    assert_eq!(result.output, "");
}

#[tokio::test]
async fn propagates_scripted_errors() {
    let fake = FakeDispatch::new();
    fake.push_err(cco_core::Error::AuthenticationFailed("bad key".to_string()));
    let err = fake.execute_task("prompt", &TaskOptions::default()).await.expect_err("should fail");
    assert!(matches!(err, cco_core::Error::AuthenticationFailed(_)));
}

#[tokio::test]
async fn resume_session_records_feedback_as_prompt() {
    let fake = FakeDispatch::new();
    fake.push_success("resumed");
    let result = fake.resume_session("session-1", "please fix the lint error").await.expect("resume");
    assert!(result.success);
    assert_eq!(fake.prompts_seen(), vec!["please fix the lint error".to_string()]);
}
