// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Mutex;

use cco_engine::Event;

use super::*;

// Environment variables are process-global; serialize tests that touch them.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const REQUIRED: &[(&str, &str)] = &[
    ("GITHUB_TOKEN", "ghp_test"),
    ("REPO_OWNER", "acme"),
    ("REPO_NAME", "widgets"),
    ("CLAUDE_CONFIGS", r#"[{"api_key":"sk-test"}]"#),
];

fn clear_all() {
    for (key, _) in REQUIRED {
        std::env::remove_var(key);
    }
    for key in [
        "EVENT_TYPE",
        "ISSUE_NUMBER",
        "PR_NUMBER",
        "BRANCH",
        "REVIEW_STATE",
        "REVIEW_BODY",
        "MAX_EMS",
        "MAX_WORKERS_PER_EM",
        "REVIEW_WAIT_MINUTES",
        "DISPATCH_STAGGER_MS",
        "STALL_TIMEOUT_MINUTES",
        "PR_LABEL",
        "WORKFLOW_ID",
        "CODING_AGENT_EXECUTABLE",
        "WORKDIR",
    ] {
        std::env::remove_var(key);
    }
}

fn set_required() {
    for (key, value) in REQUIRED {
        std::env::set_var(key, value);
    }
}

#[test]
fn missing_github_token_is_config_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_all();
    std::env::set_var("REPO_OWNER", "acme");
    std::env::set_var("REPO_NAME", "widgets");
    std::env::set_var("CLAUDE_CONFIGS", r#"[{"api_key":"sk-test"}]"#);
    std::env::set_var("EVENT_TYPE", "schedule");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    clear_all();
}

#[test]
fn issue_labeled_resolves_event_and_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_all();
    set_required();
    std::env::set_var("EVENT_TYPE", "issue_labeled");
    std::env::set_var("ISSUE_NUMBER", "42");

    let config = Config::from_env().unwrap();
    assert!(matches!(config.event, Event::IssueLabeled { issue_number: 42 }));
    assert_eq!(config.orchestration.max_ems, 3);
    assert_eq!(config.orchestration.max_workers_per_em, 3);
    assert_eq!(config.orchestration.pr_label, "cco");
    assert_eq!(config.stall_timeout_minutes, 60);
    assert_eq!(config.dispatch_stagger_ms, 2000);
    assert_eq!(config.workflow_id, "cco.yml");
    assert_eq!(config.coding_agent_executable, "claude");
    clear_all();
}

#[test]
fn overrides_take_precedence_over_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_all();
    set_required();
    std::env::set_var("EVENT_TYPE", "schedule");
    std::env::set_var("MAX_EMS", "5");
    std::env::set_var("PR_LABEL", "auto-pr");
    std::env::set_var("WORKFLOW_ID", "orchestrator.yml");

    let config = Config::from_env().unwrap();
    assert_eq!(config.orchestration.max_ems, 5);
    assert_eq!(config.orchestration.pr_label, "auto-pr");
    assert_eq!(config.workflow_id, "orchestrator.yml");
    assert!(matches!(config.event, Event::Schedule));
    clear_all();
}

#[test]
fn pull_request_review_requires_known_state() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_all();
    set_required();
    std::env::set_var("EVENT_TYPE", "pull_request_review");
    std::env::set_var("PR_NUMBER", "7");
    std::env::set_var("REVIEW_STATE", "not_a_real_state");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    clear_all();
}

#[test]
fn unrecognized_event_type_is_config_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_all();
    set_required();
    std::env::set_var("EVENT_TYPE", "not_a_real_event");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    clear_all();
}

#[test]
fn input_var_name_has_input_prefix() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_all();
    std::env::set_var("INPUT_GITHUB_TOKEN", "ghp_from_input_prefix");
    assert_eq!(input("github-token"), Some("ghp_from_input_prefix".to_string()));
    std::env::remove_var("INPUT_GITHUB_TOKEN");
}
