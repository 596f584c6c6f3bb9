// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The VCS Gateway trait (§4.4): an idempotent adapter for the
//! version-control host. The reactor is written against this trait so it
//! can run unmodified against [`crate::github::GithubGateway`] in
//! production and [`crate::fake::FakeGateway`] in tests.

use async_trait::async_trait;
use cco_core::{IssueRef, Result};

use crate::types::{DispatchOptions, MergeOutcome, PullRequest, RepoLabel, Review, ReviewComment};

#[async_trait]
pub trait VcsGateway: Send + Sync {
    /// Fetches the triggering issue's title and body, used to seed a new
    /// orchestration's [`IssueRef`] and the Director's analysis prompt.
    async fn get_issue(&self, issue_number: u64) -> Result<IssueRef>;

    /// Idempotent: treats "ref already exists" as success.
    async fn create_branch(&self, name: &str, from: &str) -> Result<()>;

    async fn find_pull_request(&self, head: &str, base: &str) -> Result<Option<PullRequest>>;

    /// Fetches a pull request by number, used to recover its head branch
    /// when an inbound event carries only the PR number.
    async fn get_pull_request(&self, pr_number: u64) -> Result<PullRequest>;

    /// Returns the existing PR if `head -> base` already exists.
    async fn create_pull_request(&self, head: &str, base: &str, title: &str, body: &str) -> Result<PullRequest>;

    /// Upsert by the hidden marker `<!-- cco-orchestrator-comment -->`.
    async fn update_issue_comment(&self, issue_number: u64, body: &str) -> Result<()>;

    /// Best-effort; returns whether the update succeeded.
    async fn update_pull_request_branch(&self, pr_number: u64) -> Result<bool>;

    async fn merge_pull_request(&self, pr_number: u64) -> Result<MergeOutcome>;

    /// Removes other phase labels, adds `label`, skipping if already present.
    async fn set_phase_label(&self, issue_number: u64, label: &str) -> Result<()>;

    /// Same idempotent semantics as `set_phase_label`, scoped to a PR.
    async fn set_status_label(&self, pr_number: u64, label: &str) -> Result<()>;

    /// Exponential-backoff retry with jitter; no retry on 400/404/422.
    async fn dispatch_workflow(
        &self,
        workflow_id: &str,
        git_ref: &str,
        inputs: serde_json::Value,
        options: DispatchOptions,
    ) -> Result<()>;

    async fn get_pull_request_reviews(&self, pr_number: u64) -> Result<Vec<Review>>;

    async fn get_pull_request_comments(&self, pr_number: u64) -> Result<Vec<ReviewComment>>;

    async fn reply_to_review_comment(&self, pr_number: u64, comment_id: u64, body: &str) -> Result<()>;

    async fn add_pull_request_comment(&self, pr_number: u64, body: &str) -> Result<()>;

    /// Creates any missing orchestrator labels from the enumerated
    /// vocabulary (color + description).
    async fn ensure_labels_exist(&self, labels: &[RepoLabel]) -> Result<()>;
}
