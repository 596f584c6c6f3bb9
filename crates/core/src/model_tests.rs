// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

#[test]
fn phase_ordering_is_monotonic_by_declaration() {
    assert!(Phase::Initialized < Phase::Analyzing);
    assert!(Phase::Analyzing < Phase::EmAssignment);
    assert!(Phase::FinalReview < Phase::Complete);
}

#[test]
fn phase_display_matches_label_vocabulary() {
    assert_eq!(Phase::EmAssignment.to_string(), "em_assignment");
    assert_eq!(Phase::Failed.to_string(), "failed");
}

#[test]
fn worker_status_ordering_matches_declared_progression() {
    assert!(WorkerStatus::Pending < WorkerStatus::InProgress);
    assert!(WorkerStatus::InProgress < WorkerStatus::PrCreated);
    assert!(WorkerStatus::Approved < WorkerStatus::Merged);
}

#[test]
fn em_all_workers_done_requires_nonempty() {
    let em = EmRecord::new(1, "t", "core", "b-em1", now());
    assert!(!em.all_workers_done());
}

#[test]
fn em_all_workers_done_true_when_every_worker_merged_or_skipped() {
    let mut em = EmRecord::new(1, "t", "core", "b-em1", now());
    let mut w1 = WorkerRecord::new(1, "w1", "b-em1-w1", now());
    w1.status = WorkerStatus::Merged;
    let mut w2 = WorkerRecord::new(2, "w2", "b-em1-w2", now());
    w2.status = WorkerStatus::Skipped;
    em.workers.push(w1);
    em.workers.push(w2);
    assert!(em.all_workers_done());
}

#[test]
fn em_all_workers_done_false_if_any_worker_pending() {
    let mut em = EmRecord::new(1, "t", "core", "b-em1", now());
    let mut w1 = WorkerRecord::new(1, "w1", "b-em1-w1", now());
    w1.status = WorkerStatus::Merged;
    let w2 = WorkerRecord::new(2, "w2", "b-em1-w2", now());
    em.workers.push(w1);
    em.workers.push(w2);
    assert!(!em.all_workers_done());
}

#[test]
fn invariants_hold_rejects_too_many_ems() {
    let issue = IssueRef { owner: "a".into(), repo: "b".into(), number: 1, title: "t".into(), body: "b".into() };
    let mut config = OrchestrationConfig::default();
    config.max_ems = 1;
    let mut state = OrchestrationState::new(issue, "a/b", "cco/1-t", "main", config, now());
    state.ems.push(EmRecord::new(1, "a", "x", "cco/1-t-em1", now()));
    state.ems.push(EmRecord::new(2, "b", "y", "cco/1-t-em2", now()));
    assert!(!state.invariants_hold());
}

#[test]
fn invariants_hold_requires_final_pr_when_complete() {
    let issue = IssueRef { owner: "a".into(), repo: "b".into(), number: 1, title: "t".into(), body: "b".into() };
    let mut state = OrchestrationState::new(issue, "a/b", "cco/1-t", "main", OrchestrationConfig::default(), now());
    state.phase = Phase::Complete;
    assert!(!state.invariants_hold());
    state.final_pr = Some(FinalPr { number: 9, url: "https://example".into(), created_at: now() });
    assert!(state.invariants_hold());
}

#[test]
fn invariants_hold_requires_error_when_failed() {
    let issue = IssueRef { owner: "a".into(), repo: "b".into(), number: 1, title: "t".into(), body: "b".into() };
    let mut state = OrchestrationState::new(issue, "a/b", "cco/1-t", "main", OrchestrationConfig::default(), now());
    state.phase = Phase::Failed;
    assert!(!state.invariants_hold());
    state.fail("boom", now());
    assert!(state.invariants_hold());
}

#[test]
fn json_round_trip_is_bit_equal() {
    let issue = IssueRef { owner: "a".into(), repo: "b".into(), number: 1, title: "t".into(), body: "b".into() };
    let state = OrchestrationState::new(issue, "a/b", "cco/1-t", "main", OrchestrationConfig::default(), now());
    let json = serde_json::to_string(&state).expect("serialize");
    let parsed: OrchestrationState = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(parsed, state);
}
