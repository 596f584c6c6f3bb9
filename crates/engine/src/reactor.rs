// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Reactor (§2, §4.1): loads state for one external event, advances it
//! by at most one transition group, persists the result, and returns.
//!
//! Every handler follows the same shape: resolve the work branch, load its
//! state document, perform the transition for this event, save. Escalating
//! errors (`AuthenticationFailed`, `MergeConflict`, `JsonHarvestFailed`) move
//! the orchestration to `phase = failed` instead of propagating; every other
//! error is absorbed by the caller and retried on the next delivery (§7).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use cco_core::{
    em_branch, parse_component_from_branch, phase_label, status_label, work_branch, worker_branch,
    Clock, ComponentKind, EmRecord, EmStatus, Error, FinalPr, OrchestrationConfig,
    OrchestrationState, Phase, Result, WorkerRecord, WorkerStatus,
};
use cco_git::LocalRepo;
use cco_llm::{LlmDispatch, TaskOptions};
use cco_state::StateStore;
use cco_vcs::{DispatchOptions, MergeOutcome, VcsGateway, REVIEW_ADDRESSED_MARKER};

use crate::event::{Event, ReviewOutcome};
use crate::idempotency::derive_token;
use crate::outcome::ReactorOutcome;
use crate::{prompts, watchdog};

#[derive(Debug, Clone, Deserialize)]
struct AnalysisEm {
    em_id: u32,
    task: String,
    focus_area: String,
    #[allow(dead_code)]
    #[serde(default)]
    estimated_workers: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkerSpec {
    worker_id: u32,
    task: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    files: Vec<String>,
}

/// Mints a fresh coding-agent session id (§4.5), minted once per dispatch
/// and reused across a component's `resumeSession` calls.
fn mint_session_id() -> String {
    format!("ses-{}", nanoid::nanoid!(19))
}

/// Ties the VCS Gateway, Local Repo, and LLM Dispatch together against one
/// event at a time.
pub struct Reactor<G: VcsGateway, R: LocalRepo, L: LlmDispatch> {
    gateway: G,
    store: StateStore<R>,
    llm: L,
    clock: Arc<dyn Clock>,
    workflow_id: String,
    stall_timeout_minutes: u32,
    config: OrchestrationConfig,
    dispatch_stagger_ms: u64,
}

impl<G: VcsGateway, R: LocalRepo, L: LlmDispatch> Reactor<G, R, L> {
    /// `config` seeds every orchestration this reactor creates (§4.11's
    /// `max-ems`/`max-workers-per-em`/`review-wait-minutes`/`pr-label`
    /// inputs); an orchestration already in progress keeps the config it
    /// was created with, read back from its saved state. `dispatch_stagger_ms`
    /// delays each `dispatch_workflow` call by that many milliseconds,
    /// spreading bursts of simultaneously-dispatched workflows (§4.11).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: G,
        repo: R,
        llm: L,
        clock: Arc<dyn Clock>,
        workflow_id: impl Into<String>,
        stall_timeout_minutes: u32,
        config: OrchestrationConfig,
        dispatch_stagger_ms: u64,
    ) -> Self {
        Self {
            gateway,
            store: StateStore::new(repo),
            llm,
            clock,
            workflow_id: workflow_id.into(),
            stall_timeout_minutes,
            config,
            dispatch_stagger_ms,
        }
    }

    /// Delays the caller by `dispatch_stagger_ms` before it fires off a
    /// `dispatch_workflow` call. A no-op when the stagger is zero.
    async fn stagger(&self) {
        if self.dispatch_stagger_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.dispatch_stagger_ms)).await;
        }
    }

    #[tracing::instrument(skip(self, event), fields(event = %event.kind()))]
    pub async fn handle_event(&self, event: Event) -> ReactorOutcome {
        let result = match event {
            Event::IssueLabeled { issue_number } => self.handle_issue_labeled(issue_number).await,
            Event::ProgressCheck { issue_number } => self.handle_progress_check(issue_number).await,
            Event::Push { branch } => self.handle_push(&branch).await,
            Event::PullRequestOpened { pr_number, branch } => self.handle_pull_request_opened(pr_number, &branch).await,
            Event::PullRequestReview { pr_number, outcome, review_body } => {
                self.handle_pull_request_review(pr_number, outcome, &review_body).await
            }
            Event::PullRequestMerged { pr_number, branch } => self.handle_pull_request_merged(pr_number, branch).await,
            Event::Schedule => self.handle_schedule().await,
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_config() => ReactorOutcome::ConfigError { detail: e.to_string() },
            Err(e) => ReactorOutcome::NoOp { reason: format!("absorbed: {e}") },
        }
    }

    /// Loads state from `branch`, distinguishing "no orchestration here"
    /// from "the state document is corrupt" — the latter is unrecoverable
    /// and short-circuits straight to [`ReactorOutcome::Failed`] rather
    /// than being retried like an ordinary transient error.
    fn load_state(&self, branch: &str) -> std::result::Result<Option<OrchestrationState>, ReactorOutcome> {
        match self.store.load_state_from_branch(branch) {
            Ok(state) => Ok(state),
            Err(e) => Err(ReactorOutcome::Failed { detail: e.to_string() }),
        }
    }

    fn escalate(&self, mut state: OrchestrationState, err: Error, now: DateTime<Utc>) -> ReactorOutcome {
        state.fail(err.to_string(), now);
        let _ = self.store.save_state(&state, Some("cco: escalate to failed"));
        ReactorOutcome::Failed { detail: err.to_string() }
    }

    // --- issue_labeled ---------------------------------------------------

    async fn handle_issue_labeled(&self, issue_number: u64) -> Result<ReactorOutcome> {
        if self.store.is_orchestration_in_progress(issue_number)? {
            return Ok(ReactorOutcome::NoOp { reason: format!("orchestration already in progress for issue {issue_number}") });
        }

        let issue = self.gateway.get_issue(issue_number).await?;
        let now = self.clock.now();
        let branch = work_branch(issue_number, &issue.title);
        let config = self.config.clone();
        let repo_full_name = format!("{}/{}", issue.owner, issue.repo);
        let mut state = OrchestrationState::new(issue.clone(), repo_full_name, branch.clone(), "main", config.clone(), now);
        self.store.initialize_state(&state)?;

        let ems = match self.run_analysis(&issue, &config).await {
            Ok(ems) => ems,
            Err(e) if e.is_escalating() => return Ok(self.escalate(state, e, now)),
            Err(e) => return Err(e),
        };

        for spec in ems {
            let mut em = EmRecord::new(spec.em_id, spec.task, spec.focus_area, em_branch(&branch, spec.em_id), now);
            em.status = EmStatus::Pending;
            state.ems.push(em);
        }
        state.phase = Phase::EmAssignment;
        state.updated_at = now;
        self.store.save_state(&state, Some("cco: record EM assignment"))?;
        self.gateway.set_phase_label(issue_number, &phase_label(Phase::EmAssignment)).await?;

        let token = derive_token("progress_check", issue_number, &[]);
        self.stagger().await;
        self.gateway
            .dispatch_workflow(
                &self.workflow_id,
                &branch,
                serde_json::json!({"event_type": "progress_check", "issue_number": issue_number}),
                DispatchOptions { idempotency_token: Some(token.to_string()) },
            )
            .await?;

        Ok(ReactorOutcome::Advanced { detail: format!("issue {issue_number} analyzed into {} EMs", state.ems.len()) })
    }

    async fn run_analysis(&self, issue: &cco_core::IssueRef, config: &OrchestrationConfig) -> Result<Vec<AnalysisEm>> {
        let prompt = prompts::analysis_prompt(issue, config.max_ems, config.max_workers_per_em);
        let opts = TaskOptions::default();
        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                self.llm.rotate_credentials();
            }
            let result = self.llm.execute_task(&prompt, &opts).await?;
            match cco_core::harvest::<Vec<AnalysisEm>>(&result.output) {
                Ok(ems) => return Ok(ems),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::JsonHarvestFailed("analysis retry loop produced no attempts".into())))
    }

    async fn run_breakdown(&self, em: &EmRecord, max_workers: u32) -> Result<Vec<WorkerSpec>> {
        let prompt = prompts::breakdown_prompt(em, max_workers);
        let opts = TaskOptions::default();
        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                self.llm.rotate_credentials();
            }
            let result = self.llm.execute_task(&prompt, &opts).await?;
            match cco_core::harvest::<Vec<WorkerSpec>>(&result.output) {
                Ok(specs) => return Ok(specs),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::JsonHarvestFailed("breakdown retry loop produced no attempts".into())))
    }

    // --- progress_check ----------------------------------------------------

    async fn handle_progress_check(&self, issue_number: u64) -> Result<ReactorOutcome> {
        let Some(branch) = self.store.find_work_branch_for_issue(issue_number)? else {
            return Ok(ReactorOutcome::NoOp { reason: format!("no orchestration found for issue {issue_number}") });
        };
        let mut state = match self.load_state(&branch) {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(ReactorOutcome::NoOp { reason: "work branch carries no state document".into() }),
            Err(outcome) => return Ok(outcome),
        };
        if state.is_terminal() {
            return Ok(ReactorOutcome::NoOp { reason: format!("orchestration for issue {issue_number} is already {}", state.phase) });
        }
        let now = self.clock.now();

        let Some(em_id) = state.ems.iter().find(|em| !em.status.is_terminal()).map(|em| em.id) else {
            return Ok(ReactorOutcome::NoOp { reason: "no EM ready to advance".into() });
        };
        let status = state.em(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?.status;

        let outcome = match status {
            EmStatus::Pending => self.advance_em_breakdown(&mut state, em_id, now).await,
            EmStatus::WorkersRunning => self.advance_next_worker(&mut state, em_id, now).await,
            EmStatus::WorkersComplete => self.advance_em_pr(&mut state, em_id, now).await,
            _ => return Ok(ReactorOutcome::NoOp { reason: "EM awaiting external review".into() }),
        };

        let detail = match outcome {
            Ok(detail) => detail,
            Err(e) if e.is_escalating() => return Ok(self.escalate(state, e, now)),
            Err(e) => return Err(e),
        };
        state.updated_at = now;
        self.store.save_state(&state, Some("cco: progress_check advance"))?;
        Ok(ReactorOutcome::Advanced { detail })
    }

    async fn advance_em_breakdown(&self, state: &mut OrchestrationState, em_id: u32, now: DateTime<Utc>) -> Result<String> {
        let work_branch = state.work_branch.clone();
        let max_workers = state.config.max_workers_per_em;
        let em = state.em(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?.clone();
        let specs = self.run_breakdown(&em, max_workers).await?;
        self.store.repo().create_branch(&em.branch, &work_branch)?;

        let em_mut = state.em_mut(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?;
        for spec in specs {
            let task = if spec.description.trim().is_empty() { spec.task } else { format!("{} — {}", spec.task, spec.description) };
            let mut worker = WorkerRecord::new(spec.worker_id, task, worker_branch(&em_mut.branch, spec.worker_id), now);
            worker.files = spec.files;
            em_mut.workers.push(worker);
        }
        em_mut.status = EmStatus::WorkersRunning;
        em_mut.updated_at = now;
        Ok(format!("EM {em_id} broken into {} workers", em_mut.workers.len()))
    }

    /// Dispatches the next pending worker's task. The worker is left at
    /// `InProgress` once its PR is requested — the `pull_request_opened`
    /// event, delivered separately when GitHub actually opens the PR, is
    /// what moves it on to `PrCreated` (§4.1.2, §4.3).
    async fn advance_next_worker(&self, state: &mut OrchestrationState, em_id: u32, now: DateTime<Utc>) -> Result<String> {
        let em = state.em(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?.clone();

        let Some(pending) = em.workers.iter().find(|w| w.status == WorkerStatus::Pending) else {
            if em.all_workers_done() {
                let em_mut = state.em_mut(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?;
                em_mut.status = EmStatus::WorkersComplete;
                em_mut.updated_at = now;
                return Ok(format!("all workers of EM {em_id} finished, ready for its PR"));
            }
            return Ok(format!("EM {em_id} has workers still in flight"));
        };
        let worker_id = pending.id;
        let worker_branch = pending.branch.clone();
        let task = pending.task.clone();
        let session_id = mint_session_id();

        {
            let w = state.em_mut(em_id).and_then(|em| em.worker_mut(worker_id)).ok_or_else(|| Error::Terminal(format!("no worker {worker_id} on EM {em_id}")))?;
            w.status = WorkerStatus::InProgress;
            w.session_id = Some(session_id.clone());
            w.updated_at = now;
        }

        self.store.repo().create_branch(&worker_branch, &em.branch)?;
        self.store.repo().checkout(&worker_branch)?;
        let workdir = self.store.repo().workdir()?;
        let opts = TaskOptions {
            working_directory: workdir.display().to_string(),
            session_id: Some(session_id),
            max_retries: 3,
            ..Default::default()
        };
        let prompt = prompts::worker_task_prompt(&task, "");
        let result = self.llm.execute_task(&prompt, &opts).await?;

        if !result.success {
            let w = state.em_mut(em_id).and_then(|em| em.worker_mut(worker_id)).ok_or_else(|| Error::Terminal(format!("no worker {worker_id} on EM {em_id}")))?;
            w.status = WorkerStatus::Failed;
            w.error = result.error.clone();
            w.updated_at = now;
            return Ok(format!("worker {worker_id} of EM {em_id} failed: {}", result.error.unwrap_or_default()));
        }

        let pushed = self.store.repo().commit_and_push(&format!("cco: worker {worker_id} task"), &[])?;
        if !pushed {
            let w = state.em_mut(em_id).and_then(|em| em.worker_mut(worker_id)).ok_or_else(|| Error::Terminal(format!("no worker {worker_id} on EM {em_id}")))?;
            w.status = WorkerStatus::Skipped;
            w.updated_at = now;
            return Ok(format!("worker {worker_id} of EM {em_id} made no changes, skipped"));
        }

        let pr = match self.gateway.find_pull_request(&worker_branch, &em.branch).await? {
            Some(pr) => pr,
            None => self.gateway.create_pull_request(&worker_branch, &em.branch, &task, "Automated worker change.").await?,
        };
        Ok(format!("worker {worker_id} of EM {em_id} dispatched, PR #{} requested", pr.number))
    }

    async fn advance_em_pr(&self, state: &mut OrchestrationState, em_id: u32, now: DateTime<Utc>) -> Result<String> {
        let em = state.em(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?.clone();
        if let Some(pr_number) = em.pr_number {
            return Ok(format!("EM {em_id} PR #{pr_number} already open"));
        }
        let pr = match self.gateway.find_pull_request(&em.branch, &state.work_branch).await? {
            Some(pr) => pr,
            None => self.gateway.create_pull_request(&em.branch, &state.work_branch, &em.task, &format!("Automated EM work for: {}", em.task)).await?,
        };
        let em_mut = state.em_mut(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?;
        em_mut.status = EmStatus::PrCreated;
        em_mut.pr_number = Some(pr.number);
        em_mut.updated_at = now;
        Ok(format!("EM {em_id} opened PR #{}", pr.number))
    }

    // --- push --------------------------------------------------------------

    async fn handle_push(&self, branch: &str) -> Result<ReactorOutcome> {
        let Some(parsed) = parse_component_from_branch(branch) else {
            return Ok(ReactorOutcome::NoOp { reason: format!("push on unparseable branch {branch}") });
        };
        let Some(work_branch) = self.store.find_work_branch_for_issue(parsed.issue_number)? else {
            return Ok(ReactorOutcome::NoOp { reason: format!("no orchestration for issue {}", parsed.issue_number) });
        };
        let mut state = match self.load_state(&work_branch) {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(ReactorOutcome::NoOp { reason: "work branch carries no state document".into() }),
            Err(outcome) => return Ok(outcome),
        };
        let now = self.clock.now();

        let touched = match (parsed.kind, parsed.em_id, parsed.worker_id) {
            (ComponentKind::Worker, Some(em_id), Some(worker_id)) => {
                if let Some(w) = state.em_mut(em_id).and_then(|em| em.worker_mut(worker_id)) {
                    w.updated_at = now;
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        if !touched {
            return Ok(ReactorOutcome::NoOp { reason: "push heartbeat for an unknown worker".into() });
        }
        self.store.save_state(&state, Some("cco: push heartbeat"))?;
        Ok(ReactorOutcome::Advanced { detail: "recorded push heartbeat".into() })
    }

    // --- pull_request_opened -------------------------------------------------

    async fn handle_pull_request_opened(&self, pr_number: u64, branch: &str) -> Result<ReactorOutcome> {
        let Some(parsed) = parse_component_from_branch(branch) else {
            return Ok(ReactorOutcome::NoOp { reason: format!("pull_request_opened on unparseable branch {branch}") });
        };
        let (ComponentKind::Worker, Some(em_id), Some(worker_id)) = (parsed.kind, parsed.em_id, parsed.worker_id) else {
            return Ok(ReactorOutcome::NoOp { reason: "pull_request_opened ignored for a non-worker branch".into() });
        };
        let Some(work_branch) = self.store.find_work_branch_for_issue(parsed.issue_number)? else {
            return Ok(ReactorOutcome::NoOp { reason: format!("no orchestration for issue {}", parsed.issue_number) });
        };
        let mut state = match self.load_state(&work_branch) {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(ReactorOutcome::NoOp { reason: "work branch carries no state document".into() }),
            Err(outcome) => return Ok(outcome),
        };
        let now = self.clock.now();

        let Some(worker) = state.em_mut(em_id).and_then(|em| em.worker_mut(worker_id)) else {
            return Ok(ReactorOutcome::NoOp { reason: format!("no worker {worker_id} on EM {em_id}") });
        };
        if worker.status != WorkerStatus::InProgress {
            return Ok(ReactorOutcome::NoOp { reason: format!("worker {worker_id} of EM {em_id} already past in_progress") });
        }
        worker.pr_number = Some(pr_number);
        worker.status = WorkerStatus::PrCreated;
        worker.updated_at = now;

        self.store.save_state(&state, Some("cco: record worker PR"))?;
        self.gateway.set_status_label(pr_number, &status_label(WorkerStatus::PrCreated)).await?;
        Ok(ReactorOutcome::Advanced { detail: format!("worker {worker_id} of EM {em_id} now pr_created") })
    }

    // --- pull_request_review ------------------------------------------------

    async fn handle_pull_request_review(&self, pr_number: u64, outcome: ReviewOutcome, review_body: &str) -> Result<ReactorOutcome> {
        let pr = self.gateway.get_pull_request(pr_number).await?;
        let Some(parsed) = parse_component_from_branch(&pr.head) else {
            return Ok(ReactorOutcome::NoOp { reason: format!("review on unparseable branch {}", pr.head) });
        };
        if parsed.kind == ComponentKind::Director {
            return Ok(ReactorOutcome::NoOp { reason: "final PR review requires no state transition".into() });
        }
        if matches!(outcome, ReviewOutcome::Commented) {
            return Ok(ReactorOutcome::NoOp { reason: "comment-only review requires no transition".into() });
        }
        let Some(work_branch) = self.store.find_work_branch_for_issue(parsed.issue_number)? else {
            return Ok(ReactorOutcome::NoOp { reason: format!("no orchestration for issue {}", parsed.issue_number) });
        };
        let mut state = match self.load_state(&work_branch) {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(ReactorOutcome::NoOp { reason: "work branch carries no state document".into() }),
            Err(outcome) => return Ok(outcome),
        };
        let now = self.clock.now();

        let result = match parsed.kind {
            ComponentKind::Worker => {
                let em_id = parsed.em_id.ok_or_else(|| Error::Terminal("worker branch carries no em id".into()))?;
                let worker_id = parsed.worker_id.ok_or_else(|| Error::Terminal("worker branch carries no worker id".into()))?;
                self.handle_worker_review(&mut state, em_id, worker_id, pr_number, outcome, review_body).await
            }
            ComponentKind::Em => {
                let em_id = parsed.em_id.ok_or_else(|| Error::Terminal("em branch carries no em id".into()))?;
                self.handle_em_review(&mut state, em_id, pr_number, outcome, review_body).await
            }
            ComponentKind::Director => unreachable!("handled above"),
        };

        let detail = match result {
            Ok(detail) => detail,
            Err(e) if e.is_escalating() => return Ok(self.escalate(state, e, now)),
            Err(e) => return Err(e),
        };
        state.updated_at = now;
        self.store.save_state(&state, Some("cco: record review outcome"))?;
        Ok(ReactorOutcome::Advanced { detail })
    }

    async fn handle_worker_review(
        &self,
        state: &mut OrchestrationState,
        em_id: u32,
        worker_id: u32,
        pr_number: u64,
        outcome: ReviewOutcome,
        review_body: &str,
    ) -> Result<String> {
        match outcome {
            ReviewOutcome::Approved => {
                let merge = self.gateway.merge_pull_request(pr_number).await?;
                let now = self.clock.now();
                let w = state.em_mut(em_id).and_then(|em| em.worker_mut(worker_id)).ok_or_else(|| Error::Terminal(format!("no worker {worker_id} on EM {em_id}")))?;
                match merge {
                    MergeOutcome::Merged | MergeOutcome::AlreadyMerged => {
                        w.status = WorkerStatus::Merged;
                        w.updated_at = now;
                        Ok(format!("worker {worker_id} of EM {em_id} merged"))
                    }
                    MergeOutcome::HeadModified => {
                        w.status = WorkerStatus::PrCreated;
                        w.updated_at = now;
                        Ok(format!("worker {worker_id} of EM {em_id} has new commits after approval; awaiting re-review"))
                    }
                    other => {
                        w.status = WorkerStatus::Approved;
                        w.updated_at = now;
                        Err(Error::MergeConflict(format!("worker {worker_id} PR #{pr_number} could not be merged: {other:?}")))
                    }
                }
            }
            ReviewOutcome::ChangesRequested => {
                let (branch, session_id) = state
                    .em(em_id)
                    .and_then(|em| em.worker(worker_id))
                    .map(|w| (w.branch.clone(), w.session_id.clone()))
                    .ok_or_else(|| Error::Terminal(format!("no worker {worker_id} on EM {em_id}")))?;
                let new_session_id = self.run_feedback_loop(&branch, pr_number, review_body, session_id.as_deref()).await?;
                let now = self.clock.now();
                let w = state.em_mut(em_id).and_then(|em| em.worker_mut(worker_id)).ok_or_else(|| Error::Terminal(format!("no worker {worker_id} on EM {em_id}")))?;
                w.status = WorkerStatus::PrCreated;
                w.reviews_addressed += 1;
                w.session_id = new_session_id;
                w.updated_at = now;
                Ok(format!("worker {worker_id} of EM {em_id} addressed review feedback"))
            }
            ReviewOutcome::Commented => unreachable!("filtered earlier"),
        }
    }

    async fn handle_em_review(&self, state: &mut OrchestrationState, em_id: u32, pr_number: u64, outcome: ReviewOutcome, review_body: &str) -> Result<String> {
        match outcome {
            ReviewOutcome::Approved => {
                let merge = self.gateway.merge_pull_request(pr_number).await?;
                let now = self.clock.now();
                let em = state.em_mut(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?;
                match merge {
                    MergeOutcome::Merged | MergeOutcome::AlreadyMerged => {
                        em.status = EmStatus::Merged;
                        em.updated_at = now;
                        Ok(format!("EM {em_id} merged"))
                    }
                    MergeOutcome::HeadModified => {
                        em.status = EmStatus::PrCreated;
                        em.updated_at = now;
                        Ok(format!("EM {em_id} has new commits after approval; awaiting re-review"))
                    }
                    other => {
                        em.status = EmStatus::Approved;
                        em.updated_at = now;
                        Err(Error::MergeConflict(format!("EM {em_id} PR #{pr_number} could not be merged: {other:?}")))
                    }
                }
            }
            ReviewOutcome::ChangesRequested => {
                let (branch, session_id) = state
                    .em(em_id)
                    .map(|em| (em.branch.clone(), em.session_id.clone()))
                    .ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?;
                let new_session_id = self.run_feedback_loop(&branch, pr_number, review_body, session_id.as_deref()).await?;
                let now = self.clock.now();
                let em = state.em_mut(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?;
                em.status = EmStatus::PrCreated;
                em.session_id = new_session_id;
                em.updated_at = now;
                Ok(format!("EM {em_id} addressed review feedback"))
            }
            ReviewOutcome::Commented => unreachable!("filtered earlier"),
        }
    }

    /// Runs one pass of the review-feedback loop (§4.5): resumes the
    /// component's coding-agent session when one already exists, otherwise
    /// starts a fresh one, then replies to every unaddressed top-level
    /// review comment with [`REVIEW_ADDRESSED_MARKER`] so a redelivered
    /// review event doesn't reply twice. Returns the session id to persist
    /// on the worker/EM record, so the next feedback round resumes it too.
    async fn run_feedback_loop(&self, branch: &str, pr_number: u64, review_body: &str, session_id: Option<&str>) -> Result<Option<String>> {
        let comments = self.gateway.get_pull_request_comments(pr_number).await?;
        let prompt = prompts::feedback_prompt(review_body, &comments);

        self.store.repo().checkout(branch)?;

        let (result, used_session_id) = match session_id {
            Some(id) => (self.llm.resume_session(id, &prompt).await?, id.to_string()),
            None => {
                let workdir = self.store.repo().workdir()?;
                let id = mint_session_id();
                let opts = TaskOptions { working_directory: workdir.display().to_string(), session_id: Some(id.clone()), max_retries: 3, ..Default::default() };
                (self.llm.execute_task(&prompt, &opts).await?, id)
            }
        };
        if !result.success {
            return Ok(Some(used_session_id));
        }

        if self.store.repo().commit_and_push(&format!("cco: address review feedback on #{pr_number}"), &[])? {
            let top_level = comments.iter().filter(|c| c.in_reply_to_id.is_none());
            for comment in top_level {
                let already_replied = comments.iter().any(|c| c.in_reply_to_id == Some(comment.id) && c.body.contains(REVIEW_ADDRESSED_MARKER));
                if already_replied {
                    continue;
                }
                let body = format!("Addressed in the latest commit.\n\n{REVIEW_ADDRESSED_MARKER}");
                let _ = self.gateway.reply_to_review_comment(pr_number, comment.id, &body).await;
            }
        } else {
            self.gateway.add_pull_request_comment(pr_number, "No changes were necessary to address this feedback.").await?;
        }
        Ok(Some(used_session_id))
    }

    // --- pull_request_merged -------------------------------------------------

    async fn handle_pull_request_merged(&self, pr_number: u64, branch: Option<String>) -> Result<ReactorOutcome> {
        let branch = match branch {
            Some(b) => b,
            None => self.gateway.get_pull_request(pr_number).await?.head,
        };
        let Some(parsed) = parse_component_from_branch(&branch) else {
            return Ok(ReactorOutcome::NoOp { reason: format!("merge on unparseable branch {branch}") });
        };
        let Some(work_branch) = self.store.find_work_branch_for_issue(parsed.issue_number)? else {
            return Ok(ReactorOutcome::NoOp { reason: format!("no orchestration for issue {}", parsed.issue_number) });
        };
        let mut state = match self.load_state(&work_branch) {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(ReactorOutcome::NoOp { reason: "work branch carries no state document".into() }),
            Err(outcome) => return Ok(outcome),
        };
        let now = self.clock.now();

        let result = match parsed.kind {
            ComponentKind::Worker => {
                let em_id = parsed.em_id.ok_or_else(|| Error::Terminal("worker branch carries no em id".into()))?;
                let worker_id = parsed.worker_id.ok_or_else(|| Error::Terminal("worker branch carries no worker id".into()))?;
                self.complete_worker(&mut state, em_id, worker_id, now).await
            }
            ComponentKind::Em => {
                let em_id = parsed.em_id.ok_or_else(|| Error::Terminal("em branch carries no em id".into()))?;
                self.complete_em(&mut state, em_id, now).await
            }
            ComponentKind::Director => self.complete_final(&mut state, now),
        };

        let detail = match result {
            Ok(detail) => detail,
            Err(e) if e.is_escalating() => return Ok(self.escalate(state, e, now)),
            Err(e) => return Err(e),
        };
        state.updated_at = now;
        self.store.save_state(&state, Some("cco: record merge"))?;
        Ok(ReactorOutcome::Advanced { detail })
    }

    async fn complete_worker(&self, state: &mut OrchestrationState, em_id: u32, worker_id: u32, now: DateTime<Utc>) -> Result<String> {
        {
            let w = state.em_mut(em_id).and_then(|em| em.worker_mut(worker_id)).ok_or_else(|| Error::Terminal(format!("no worker {worker_id} on EM {em_id}")))?;
            w.status = WorkerStatus::Merged;
            w.updated_at = now;
        }
        let em = state.em(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?.clone();
        if !em.all_workers_done() {
            return Ok(format!("worker {worker_id} of EM {em_id} merged"));
        }
        let pr = match self.gateway.find_pull_request(&em.branch, &state.work_branch).await? {
            Some(pr) => pr,
            None => self.gateway.create_pull_request(&em.branch, &state.work_branch, &em.task, &format!("Automated EM work for: {}", em.task)).await?,
        };
        let em_mut = state.em_mut(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?;
        em_mut.status = EmStatus::PrCreated;
        em_mut.pr_number = Some(pr.number);
        em_mut.updated_at = now;
        Ok(format!("worker {worker_id} of EM {em_id} merged; EM {em_id} PR #{} opened", pr.number))
    }

    async fn complete_em(&self, state: &mut OrchestrationState, em_id: u32, now: DateTime<Utc>) -> Result<String> {
        {
            let em = state.em_mut(em_id).ok_or_else(|| Error::Terminal(format!("no EM {em_id}")))?;
            em.status = EmStatus::Merged;
            em.updated_at = now;
        }
        if !state.ems.iter().all(|em| em.status == EmStatus::Merged) {
            return Ok(format!("EM {em_id} merged"));
        }
        let (title, body) = prompts::final_pr_title_and_body(&state.issue.clone(), &state.ems.clone());
        let pr = match self.gateway.find_pull_request(&state.work_branch, &state.base_branch).await? {
            Some(pr) => pr,
            None => self.gateway.create_pull_request(&state.work_branch, &state.base_branch, &title, &body).await?,
        };
        state.final_pr = Some(FinalPr { number: pr.number, url: pr.url.clone(), created_at: now });
        state.phase = Phase::FinalReview;
        Ok(format!("EM {em_id} merged; final PR #{} opened", pr.number))
    }

    fn complete_final(&self, state: &mut OrchestrationState, now: DateTime<Utc>) -> Result<String> {
        if state.final_pr.is_none() {
            return Err(Error::Terminal("final PR merged but no final_pr recorded".into()));
        }
        state.phase = Phase::Complete;
        state.updated_at = now;
        Ok("final PR merged; orchestration complete".to_string())
    }

    // --- schedule ------------------------------------------------------------

    async fn handle_schedule(&self) -> Result<ReactorOutcome> {
        let now = self.clock.now();
        let branches = self.store.repo().list_remote_branches()?;
        let mut stalled_count = 0usize;

        for branch in branches {
            let Some(parsed) = parse_component_from_branch(&branch) else { continue };
            if parsed.kind != ComponentKind::Director {
                continue;
            }
            let Some(mut state) = self.store.load_state_from_branch(&branch)? else { continue };
            if state.is_terminal() {
                continue;
            }
            let stalled = watchdog::find_stalled(&state, now, self.stall_timeout_minutes);
            if stalled.is_empty() {
                continue;
            }
            for record in &stalled {
                self.gateway.update_issue_comment(state.issue.number, &watchdog::stalled_message(record)).await?;
                let component_ids: Vec<u32> = [record.em_id, record.worker_id].into_iter().flatten().collect();
                let token = derive_token("progress_check", state.issue.number, &component_ids);
                self.stagger().await;
                self.gateway
                    .dispatch_workflow(
                        &self.workflow_id,
                        &branch,
                        serde_json::json!({"event_type": "progress_check", "issue_number": state.issue.number, "resume": true}),
                        DispatchOptions { idempotency_token: Some(token.to_string()) },
                    )
                    .await?;
            }
            state.updated_at = now;
            self.store.save_state(&state, Some("cco: watchdog touch"))?;
            stalled_count += stalled.len();
        }

        if stalled_count == 0 {
            Ok(ReactorOutcome::NoOp { reason: "no stalled orchestrations found".into() })
        } else {
            Ok(ReactorOutcome::Advanced { detail: format!("re-dispatched {stalled_count} stalled component(s)") })
        }
    }
}

#[cfg(test)]
#[path = "reactor_tests.rs"]
mod tests;
