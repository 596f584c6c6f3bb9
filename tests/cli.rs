//! Binary smoke tests for the `cco` CLI.
//!
//! These exercise the configuration-resolution path only: every case here
//! fails before touching GitHub or a local git checkout, so the tests run
//! without network access or a seeded repository.

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)] // cargo_bin works fine for our use case
fn cco() -> Command {
    let mut cmd = Command::cargo_bin("cco").unwrap();
    cmd.env_clear();
    cmd
}

#[test]
fn binary_exists() {
    cco();
}

#[test]
fn missing_required_inputs_exits_nonzero() {
    cco().assert().failure().code(1).stdout(predicate::str::contains("missing required input"));
}

#[test]
fn missing_claude_configs_exits_nonzero() {
    cco()
        .env("GITHUB_TOKEN", "ghp_test")
        .env("REPO_OWNER", "acme")
        .env("REPO_NAME", "widgets")
        .env("EVENT_TYPE", "schedule")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("claude-configs"));
}

#[test]
fn invalid_claude_configs_json_exits_nonzero() {
    cco()
        .env("GITHUB_TOKEN", "ghp_test")
        .env("REPO_OWNER", "acme")
        .env("REPO_NAME", "widgets")
        .env("EVENT_TYPE", "schedule")
        .env("CLAUDE_CONFIGS", "not json")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("claude-configs"));
}

#[test]
fn unrecognized_event_type_exits_nonzero() {
    cco()
        .env("GITHUB_TOKEN", "ghp_test")
        .env("REPO_OWNER", "acme")
        .env("REPO_NAME", "widgets")
        .env("CLAUDE_CONFIGS", r#"[{"api_key":"sk-test"}]"#)
        .env("EVENT_TYPE", "not_a_real_event")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("unrecognized event-type"));
}

#[test]
fn missing_issue_number_for_issue_labeled_exits_nonzero() {
    cco()
        .env("GITHUB_TOKEN", "ghp_test")
        .env("REPO_OWNER", "acme")
        .env("REPO_NAME", "widgets")
        .env("CLAUDE_CONFIGS", r#"[{"api_key":"sk-test"}]"#)
        .env("EVENT_TYPE", "issue_labeled")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("issue-number"));
}
