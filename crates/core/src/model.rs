// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestration data model: [`IssueRef`], [`Phase`], [`WorkerRecord`],
//! [`EmRecord`], and the root [`OrchestrationState`].
//!
//! The hierarchy is a strict tree (orchestration → EMs → workers); every
//! record is value-typed and cross-level lookups use `(id, id)` keys rather
//! than back-references, so there is nothing here that needs `Rc`/`RefCell`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An issue on the version-control host, captured once and immutable
/// thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub body: String,
}

/// The orchestration-wide phase. Variants are declared in advancement
/// order; `failed` is a terminal sink reachable from any non-terminal
/// phase and is handled specially by the state-merge rules rather than by
/// its position in this list (see `cco_state::merge::merge_phase`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initialized,
    Analyzing,
    EmAssignment,
    WorkerExecution,
    WorkerReview,
    EmMerging,
    EmReview,
    FinalMerge,
    FinalReview,
    Complete,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }
}

crate::simple_display! {
    Phase {
        Initialized => "initialized",
        Analyzing => "analyzing",
        EmAssignment => "em_assignment",
        WorkerExecution => "worker_execution",
        WorkerReview => "worker_review",
        EmMerging => "em_merging",
        EmReview => "em_review",
        FinalMerge => "final_merge",
        FinalReview => "final_review",
        Complete => "complete",
        Failed => "failed",
    }
}

/// A worker's lifecycle status. Declared in the ordering used by the
/// merge rules (§4.2) to pick the "further advanced" side; the two
/// backward transitions the invariants permit (`pr_created ->
/// changes_requested` on review, `approved -> pr_created` after a fix)
/// are enforced by the reactor, not by this derive — the merge rule
/// still wants the textual ordering below, not a strictly-increasing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Pending,
    InProgress,
    PrCreated,
    ChangesRequested,
    Approved,
    Merged,
    Skipped,
    Failed,
}

impl WorkerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerStatus::Merged | WorkerStatus::Skipped | WorkerStatus::Failed)
    }

    pub fn is_done_for_em(self) -> bool {
        matches!(self, WorkerStatus::Merged | WorkerStatus::Approved | WorkerStatus::Skipped)
    }
}

crate::simple_display! {
    WorkerStatus {
        Pending => "pending",
        InProgress => "in_progress",
        PrCreated => "pr_created",
        ChangesRequested => "changes_requested",
        Approved => "approved",
        Merged => "merged",
        Skipped => "skipped",
        Failed => "failed",
    }
}

/// An EM's lifecycle status. See [`WorkerStatus`] for the ordering
/// rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmStatus {
    Pending,
    WorkersRunning,
    WorkersComplete,
    PrCreated,
    ChangesRequested,
    Approved,
    Merged,
    Skipped,
    Failed,
}

impl EmStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EmStatus::Merged | EmStatus::Skipped | EmStatus::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, EmStatus::WorkersRunning | EmStatus::WorkersComplete)
    }
}

crate::simple_display! {
    EmStatus {
        Pending => "pending",
        WorkersRunning => "workers_running",
        WorkersComplete => "workers_complete",
        PrCreated => "pr_created",
        ChangesRequested => "changes_requested",
        Approved => "approved",
        Merged => "merged",
        Skipped => "skipped",
        Failed => "failed",
    }
}

/// One logged error occurrence. Merge rule: set-union keyed by
/// `(timestamp, message)` (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// A single leaf coding task, owned by one EM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// 1-based position within its EM.
    pub id: u32,
    pub task: String,
    /// Advisory expected file scope; never enforced.
    pub files: Vec<String>,
    pub branch: String,
    pub status: WorkerStatus,
    pub pr_number: Option<u64>,
    /// Monotonically non-decreasing across saves for the same record.
    pub reviews_addressed: u32,
    pub error: Option<String>,
    /// Coding-agent session id, minted on first dispatch and reused by
    /// `resumeSession` across the review-feedback loop (§4.5). Absent from
    /// documents written before this field existed.
    #[serde(default)]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkerRecord {
    pub fn new(id: u32, task: impl Into<String>, branch: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            task: task.into(),
            files: Vec::new(),
            branch: branch.into(),
            status: WorkerStatus::Pending,
            pr_number: None,
            reviews_addressed: 0,
            error: None,
            session_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One slice of work, decomposed into an ordered sequence of workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmRecord {
    pub id: u32,
    pub task: String,
    pub focus_area: String,
    pub branch: String,
    pub status: EmStatus,
    pub workers: Vec<WorkerRecord>,
    pub pr_number: Option<u64>,
    /// Coding-agent session id for the EM's own merge/PR work, resumed
    /// across its review-feedback loop the same way a worker's is (§4.5).
    #[serde(default)]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmRecord {
    pub fn new(id: u32, task: impl Into<String>, focus_area: impl Into<String>, branch: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            task: task.into(),
            focus_area: focus_area.into(),
            branch: branch.into(),
            status: EmStatus::Pending,
            workers: Vec::new(),
            pr_number: None,
            session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn worker_mut(&mut self, id: u32) -> Option<&mut WorkerRecord> {
        self.workers.iter_mut().find(|w| w.id == id)
    }

    pub fn worker(&self, id: u32) -> Option<&WorkerRecord> {
        self.workers.iter().find(|w| w.id == id)
    }

    /// True once every worker has reached a status that the EM can
    /// consider "done" (merged, approved, or skipped — §4.1 table).
    pub fn all_workers_done(&self) -> bool {
        !self.workers.is_empty() && self.workers.iter().all(|w| w.status.is_done_for_em())
    }
}

/// The reference to a landed final pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPr {
    pub number: u64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Per-orchestration configuration, resolved once from the reactor's
/// inputs (§6) and carried inside the state document so later reactor
/// invocations see the same limits the orchestration was created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    pub max_ems: u32,
    pub max_workers_per_em: u32,
    pub review_wait_minutes: u32,
    pub pr_label: String,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self { max_ems: 3, max_workers_per_em: 3, review_wait_minutes: 5, pr_label: "cco".to_string() }
    }
}

/// The root document persisted at `.orchestrator/state.json` on the work
/// branch (§6). Exactly one per issue, identified by `work_branch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationState {
    pub version: u32,
    pub issue: IssueRef,
    pub repo: String,
    pub phase: Phase,
    pub work_branch: String,
    pub base_branch: String,
    pub ems: Vec<EmRecord>,
    pub final_pr: Option<FinalPr>,
    pub config: OrchestrationConfig,
    pub analysis_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<Vec<ErrorEntry>>,
}

pub const CURRENT_STATE_VERSION: u32 = 1;

impl OrchestrationState {
    pub fn new(
        issue: IssueRef,
        repo: impl Into<String>,
        work_branch: impl Into<String>,
        base_branch: impl Into<String>,
        config: OrchestrationConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            version: CURRENT_STATE_VERSION,
            issue,
            repo: repo.into(),
            phase: Phase::Initialized,
            work_branch: work_branch.into(),
            base_branch: base_branch.into(),
            ems: Vec::new(),
            final_pr: None,
            config,
            analysis_summary: None,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn em_mut(&mut self, id: u32) -> Option<&mut EmRecord> {
        self.ems.iter_mut().find(|em| em.id == id)
    }

    pub fn em(&self, id: u32) -> Option<&EmRecord> {
        self.ems.iter().find(|em| em.id == id)
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// §8 quantified invariant: `complete` implies a final PR and every EM
    /// merged.
    pub fn invariants_hold(&self) -> bool {
        if self.ems.len() as u32 > self.config.max_ems {
            return false;
        }
        if self.ems.iter().any(|em| em.workers.len() as u32 > self.config.max_workers_per_em) {
            return false;
        }
        if self.phase == Phase::Complete
            && (self.final_pr.is_none() || !self.ems.iter().all(|em| em.status == EmStatus::Merged))
        {
            return false;
        }
        if self.phase == Phase::Failed && self.error.as_ref().map(|e| e.is_empty()).unwrap_or(true) {
            return false;
        }
        true
    }

    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.phase = Phase::Failed;
        self.updated_at = now;
        let entry = ErrorEntry { timestamp: now, message: message.into() };
        self.error.get_or_insert_with(Vec::new).push(entry);
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct IssueRefBuilder => IssueRef {
        set { number: u64 = 1 }
        into { owner: String = "acme" }
        into { repo: String = "widgets" }
        into { title: String = "Build a REST API" }
        into { body: String = "We need a REST API." }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
