// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use cco_core::{Clock, FakeClock, IssueRef, Phase, WorkerStatus};
use cco_git::FakeRepo;
use cco_llm::FakeDispatch;
use cco_vcs::{FakeGateway, MergeOutcome};

use super::*;

type TestReactor = Reactor<FakeGateway, FakeRepo, FakeDispatch>;

fn build() -> (TestReactor, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::new());
    let reactor = Reactor::new(
        FakeGateway::new(),
        FakeRepo::new("main"),
        FakeDispatch::new(),
        clock.clone(),
        "cco.yml",
        5,
        cco_core::OrchestrationConfig::default(),
        0,
    );
    (reactor, clock)
}

/// Looks up the PR a just-dispatched worker requested and delivers the
/// `pull_request_opened` event for it, mirroring the real two-step happy
/// path: dispatch leaves the worker `InProgress`, and only this event
/// moves it on to `PrCreated`.
async fn open_worker_pr(reactor: &TestReactor, branch: &str, em_id: u32, worker_id: u32) -> u64 {
    let state = reactor.store.load_state_from_branch(branch).expect("load").expect("state present");
    let em = state.ems.iter().find(|em| em.id == em_id).expect("em exists");
    let worker_branch = em.worker(worker_id).expect("worker exists").branch.clone();
    let pr = reactor.gateway.find_pull_request(&worker_branch, &em.branch).await.expect("find pr").expect("worker pr requested");
    let outcome = reactor.handle_event(Event::PullRequestOpened { pr_number: pr.number, branch: worker_branch }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");
    pr.number
}

fn seed_issue(reactor: &TestReactor, number: u64) {
    reactor.gateway.set_issue(IssueRef { owner: "acme".into(), repo: "widgets".into(), number, title: "Build a thing".into(), body: "We need a thing.".into() });
}

#[tokio::test]
async fn issue_labeled_creates_ems_and_advances_phase() {
    let (reactor, _clock) = build();
    seed_issue(&reactor, 1);
    reactor.llm.push_success(r#"[{"em_id":1,"task":"Do the thing","focus_area":"backend","estimated_workers":1}]"#);

    let outcome = reactor.handle_event(Event::IssueLabeled { issue_number: 1 }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");

    let branch = reactor.store.find_work_branch_for_issue(1).expect("find branch").expect("branch exists");
    let state = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    assert_eq!(state.phase, Phase::EmAssignment);
    assert_eq!(state.ems.len(), 1);
    assert_eq!(state.ems[0].task, "Do the thing");
}

#[tokio::test]
async fn issue_labeled_is_noop_when_already_in_progress() {
    let (reactor, _clock) = build();
    seed_issue(&reactor, 1);
    reactor.llm.push_success(r#"[{"em_id":1,"task":"Do the thing","focus_area":"backend","estimated_workers":1}]"#);
    reactor.handle_event(Event::IssueLabeled { issue_number: 1 }).await;

    let outcome = reactor.handle_event(Event::IssueLabeled { issue_number: 1 }).await;
    assert!(matches!(outcome, ReactorOutcome::NoOp { .. }), "{outcome:?}");
}

/// Drives one EM with one worker through breakdown, worker dispatch, worker
/// merge, EM PR, EM merge, and the final PR, exercising every transition in
/// `handle_progress_check`/`handle_pull_request_review`/
/// `handle_pull_request_merged` along the way.
#[tokio::test]
async fn full_lifecycle_reaches_complete() {
    let (reactor, _clock) = build();
    seed_issue(&reactor, 1);
    reactor.llm.push_success(r#"[{"em_id":1,"task":"Do the thing","focus_area":"backend","estimated_workers":1}]"#);
    reactor.handle_event(Event::IssueLabeled { issue_number: 1 }).await;

    reactor.llm.push_success(r#"[{"worker_id":1,"task":"Implement widget","description":"","files":["src/lib.rs"]}]"#);
    let outcome = reactor.handle_event(Event::ProgressCheck { issue_number: 1 }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");

    let branch = reactor.store.find_work_branch_for_issue(1).expect("find branch").expect("branch exists");
    let state = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    assert_eq!(state.ems[0].status, EmStatus::WorkersRunning);
    assert_eq!(state.ems[0].workers.len(), 1);

    reactor.store.repo().stage_write("src/lib.rs", "fn widget() {}");
    reactor.llm.push_success("implemented the widget");
    let outcome = reactor.handle_event(Event::ProgressCheck { issue_number: 1 }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");

    let state = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    assert_eq!(state.ems[0].worker(1).expect("worker exists").status, WorkerStatus::InProgress);

    let worker_pr = open_worker_pr(&reactor, &branch, 1, 1).await;
    let state = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    let worker = state.ems[0].worker(1).expect("worker exists");
    assert_eq!(worker.status, WorkerStatus::PrCreated);
    assert_eq!(worker.pr_number, Some(worker_pr));

    let outcome = reactor.handle_event(Event::PullRequestReview { pr_number: worker_pr, outcome: ReviewOutcome::Approved, review_body: String::new() }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");
    let outcome = reactor.handle_event(Event::PullRequestMerged { pr_number: worker_pr, branch: None }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");

    let state = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    assert_eq!(state.ems[0].worker(1).expect("worker exists").status, WorkerStatus::Merged);
    assert_eq!(state.ems[0].status, EmStatus::PrCreated);
    let em_pr = state.ems[0].pr_number.expect("EM PR recorded");

    let outcome = reactor.handle_event(Event::PullRequestReview { pr_number: em_pr, outcome: ReviewOutcome::Approved, review_body: String::new() }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");
    let outcome = reactor.handle_event(Event::PullRequestMerged { pr_number: em_pr, branch: None }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");

    let state = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    assert_eq!(state.ems[0].status, EmStatus::Merged);
    assert_eq!(state.phase, Phase::FinalReview);
    let final_pr = state.final_pr.expect("final PR recorded").number;

    let outcome = reactor.handle_event(Event::PullRequestMerged { pr_number: final_pr, branch: None }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");
    let state = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    assert_eq!(state.phase, Phase::Complete);
}

#[tokio::test]
async fn worker_review_approved_but_unmergeable_escalates_to_failed() {
    let (reactor, _clock) = build();
    seed_issue(&reactor, 1);
    reactor.llm.push_success(r#"[{"em_id":1,"task":"Do the thing","focus_area":"backend","estimated_workers":1}]"#);
    reactor.handle_event(Event::IssueLabeled { issue_number: 1 }).await;
    reactor.llm.push_success(r#"[{"worker_id":1,"task":"Implement widget","description":"","files":["src/lib.rs"]}]"#);
    reactor.handle_event(Event::ProgressCheck { issue_number: 1 }).await;
    reactor.store.repo().stage_write("src/lib.rs", "fn widget() {}");
    reactor.llm.push_success("implemented the widget");
    reactor.handle_event(Event::ProgressCheck { issue_number: 1 }).await;

    let branch = reactor.store.find_work_branch_for_issue(1).expect("find branch").expect("branch exists");
    let worker_pr = open_worker_pr(&reactor, &branch, 1, 1).await;
    reactor.gateway.set_merge_outcome(worker_pr, MergeOutcome::NotMergeable);

    let outcome = reactor.handle_event(Event::PullRequestReview { pr_number: worker_pr, outcome: ReviewOutcome::Approved, review_body: String::new() }).await;
    assert!(matches!(outcome, ReactorOutcome::Failed { .. }), "{outcome:?}");

    let state = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    assert_eq!(state.phase, Phase::Failed);
    assert_eq!(state.ems[0].worker(1).expect("worker exists").status, WorkerStatus::Approved);
}

#[tokio::test]
async fn worker_review_changes_requested_runs_feedback_loop() {
    let (reactor, _clock) = build();
    seed_issue(&reactor, 1);
    reactor.llm.push_success(r#"[{"em_id":1,"task":"Do the thing","focus_area":"backend","estimated_workers":1}]"#);
    reactor.handle_event(Event::IssueLabeled { issue_number: 1 }).await;
    reactor.llm.push_success(r#"[{"worker_id":1,"task":"Implement widget","description":"","files":["src/lib.rs"]}]"#);
    reactor.handle_event(Event::ProgressCheck { issue_number: 1 }).await;
    reactor.store.repo().stage_write("src/lib.rs", "fn widget() {}");
    reactor.llm.push_success("implemented the widget");
    reactor.handle_event(Event::ProgressCheck { issue_number: 1 }).await;

    let branch = reactor.store.find_work_branch_for_issue(1).expect("find branch").expect("branch exists");
    let worker_pr = open_worker_pr(&reactor, &branch, 1, 1).await;

    reactor.store.repo().stage_write("src/lib.rs", "fn widget() { /* fixed */ }");
    reactor.llm.push_success("addressed the feedback");
    let outcome = reactor
        .handle_event(Event::PullRequestReview { pr_number: worker_pr, outcome: ReviewOutcome::ChangesRequested, review_body: "please add a doc comment".into() })
        .await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");

    let state = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    let worker = state.ems[0].worker(1).expect("worker exists");
    assert_eq!(worker.status, WorkerStatus::PrCreated);
    assert_eq!(worker.reviews_addressed, 1);
}

#[tokio::test]
async fn push_heartbeat_touches_known_worker() {
    let (reactor, clock) = build();
    seed_issue(&reactor, 1);
    reactor.llm.push_success(r#"[{"em_id":1,"task":"Do the thing","focus_area":"backend","estimated_workers":1}]"#);
    reactor.handle_event(Event::IssueLabeled { issue_number: 1 }).await;
    reactor.llm.push_success(r#"[{"worker_id":1,"task":"Implement widget","description":"","files":["src/lib.rs"]}]"#);
    reactor.handle_event(Event::ProgressCheck { issue_number: 1 }).await;

    let branch = reactor.store.find_work_branch_for_issue(1).expect("find branch").expect("branch exists");
    let before = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    let worker_branch = before.ems[0].worker(1).expect("worker exists").branch.clone();

    clock.advance(chrono::Duration::minutes(1));
    let outcome = reactor.handle_event(Event::Push { branch: worker_branch }).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");

    let after = reactor.store.load_state_from_branch(&branch).expect("load").expect("state present");
    assert!(after.ems[0].worker(1).expect("worker exists").updated_at > before.ems[0].worker(1).expect("worker exists").updated_at);
}

#[tokio::test]
async fn push_on_unparseable_branch_is_noop() {
    let (reactor, _clock) = build();
    let outcome = reactor.handle_event(Event::Push { branch: "main".into() }).await;
    assert!(matches!(outcome, ReactorOutcome::NoOp { .. }), "{outcome:?}");
}

#[tokio::test]
async fn schedule_is_noop_when_nothing_has_stalled() {
    let (reactor, _clock) = build();
    seed_issue(&reactor, 1);
    reactor.llm.push_success(r#"[{"em_id":1,"task":"Do the thing","focus_area":"backend","estimated_workers":1}]"#);
    reactor.handle_event(Event::IssueLabeled { issue_number: 1 }).await;

    let outcome = reactor.handle_event(Event::Schedule).await;
    assert!(matches!(outcome, ReactorOutcome::NoOp { .. }), "{outcome:?}");
}

#[tokio::test]
async fn schedule_redispatches_a_stalled_em() {
    let (reactor, clock) = build();
    seed_issue(&reactor, 1);
    reactor.llm.push_success(r#"[{"em_id":1,"task":"Do the thing","focus_area":"backend","estimated_workers":1}]"#);
    reactor.handle_event(Event::IssueLabeled { issue_number: 1 }).await;

    clock.advance(chrono::Duration::minutes(10));
    let outcome = reactor.handle_event(Event::Schedule).await;
    assert!(matches!(outcome, ReactorOutcome::Advanced { .. }), "{outcome:?}");
    assert_eq!(reactor.gateway.issue_comment(1).as_deref(), Some("EM 1 has not progressed within the stall timeout; resuming automatically."));
    assert_eq!(reactor.gateway.dispatched().len(), 1);
}
