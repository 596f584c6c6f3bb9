// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{TimeZone, Utc};

use super::*;
use cco_core::{EmRecord, IssueRef, OrchestrationConfig, Phase};
use cco_git::FakeRepo;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid datetime")
}

fn issue() -> IssueRef {
    IssueRef { owner: "acme".to_string(), repo: "widgets".to_string(), number: 7, title: "Build a thing".to_string(), body: "body".to_string() }
}

fn base_state() -> OrchestrationState {
    OrchestrationState::new(issue(), "acme/widgets", "cco/7-build-a-thing", "main", OrchestrationConfig::default(), now())
}

#[test]
fn initialize_state_creates_branch_and_commits_document() {
    let repo = FakeRepo::new("main");
    let store = StateStore::new(repo);
    let state = base_state();

    store.initialize_state(&state).expect("initialize state");

    let loaded = store.load_state_from_branch(&state.work_branch).expect("load state from branch");
    assert_eq!(loaded.expect("state present").phase, Phase::Initialized);
}

#[test]
fn load_state_from_branch_returns_none_when_absent() {
    let repo = FakeRepo::new("main");
    let store = StateStore::new(repo);
    assert!(store.load_state_from_branch("cco/999-missing").expect("load").is_none());
}

#[test]
fn load_state_from_branch_rejects_unsupported_version() {
    let repo = FakeRepo::new("main");
    repo.seed_file("cco/7-build-a-thing", cco_git::STATE_DOCUMENT_PATH, r#"{"version":999}"#);
    let store = StateStore::new(repo);
    let err = store.load_state_from_branch("cco/7-build-a-thing").expect_err("should reject");
    assert!(matches!(err, cco_core::Error::StateSave(_)));
}

#[test]
fn save_state_merges_with_existing_document_rather_than_overwriting() {
    let repo = FakeRepo::new("main");
    let store = StateStore::new(repo);
    let mut state = base_state();
    store.initialize_state(&state).expect("initialize");

    // Simulate a concurrent invocation that already advanced the phase
    // and recorded an EM.
    let mut concurrent = base_state();
    concurrent.phase = Phase::Analyzing;
    concurrent.ems.push(EmRecord::new(1, "task", "focus", "cco/7-build-a-thing-em1", now()));
    let serialized = serde_json::to_string(&concurrent).expect("serialize");
    store.repo().checkout(&state.work_branch).expect("checkout");
    store.repo().write_file(cco_git::STATE_DOCUMENT_PATH, &serialized).expect("write");
    store.repo().commit_and_push("concurrent write", &[cco_git::STATE_DOCUMENT_PATH.to_string()]).expect("push");

    state.phase = Phase::EmAssignment;
    store.save_state(&state, None).expect("save state");

    let merged = store.load_state_from_branch(&state.work_branch).expect("load").expect("state present");
    assert_eq!(merged.phase, Phase::EmAssignment);
    assert_eq!(merged.ems.len(), 1);
}

#[test]
fn save_state_retries_through_rejected_pushes() {
    let repo = FakeRepo::new("main");
    repo.create_branch("cco/7-build-a-thing", "main").expect("create");
    repo.fail_next_pushes(2);
    let store = StateStore::new(repo);
    let state = base_state();

    store.save_state(&state, None).expect("save state should survive two rejected pushes");
}

#[test]
fn save_state_restores_original_branch_on_success() {
    let repo = FakeRepo::new("main");
    let store = StateStore::new(repo);
    let state = base_state();
    store.initialize_state(&state).expect("initialize");
    store.repo().checkout("main").expect("back to main");

    store.save_state(&state, None).expect("save state");
    assert_eq!(store.repo().current_branch().expect("current branch"), "main");
}

#[test]
fn find_work_branch_for_issue_locates_director_branch() {
    let repo = FakeRepo::new("main");
    let store = StateStore::new(repo);
    let state = base_state();
    store.initialize_state(&state).expect("initialize");

    let found = store.find_work_branch_for_issue(7).expect("find work branch");
    assert_eq!(found, Some("cco/7-build-a-thing".to_string()));
    assert_eq!(store.find_work_branch_for_issue(8).expect("find work branch"), None);
}

#[test]
fn is_orchestration_in_progress_reflects_terminal_phase() {
    let repo = FakeRepo::new("main");
    let store = StateStore::new(repo);
    let mut state = base_state();
    store.initialize_state(&state).expect("initialize");
    assert!(store.is_orchestration_in_progress(7).expect("in progress"));

    state.phase = Phase::Complete;
    state.final_pr = Some(cco_core::FinalPr { number: 1, url: "https://example.com/1".to_string(), created_at: now() });
    state.ems = vec![];
    store.save_state(&state, None).expect("save");
    assert!(!store.is_orchestration_in_progress(7).expect("not in progress"));
}
