// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory [`VcsGateway`] for exercising the reactor without a
//! network-connected GitHub client.

use std::collections::HashMap;

use async_trait::async_trait;
use cco_core::{Error, IssueRef, Result};
use parking_lot::Mutex;

use crate::gateway::VcsGateway;
use crate::types::{DispatchOptions, MergeOutcome, PullRequest, RepoLabel, Review, ReviewComment};

#[derive(Default)]
struct State {
    issues: HashMap<u64, IssueRef>,
    branches: Vec<String>,
    pull_requests: Vec<PullRequest>,
    next_pr_number: u64,
    issue_comments: HashMap<u64, String>,
    pr_labels: HashMap<u64, Vec<String>>,
    issue_labels: HashMap<u64, Vec<String>>,
    merged: Vec<u64>,
    merge_outcomes: HashMap<u64, MergeOutcome>,
    dispatched: Vec<(String, String, serde_json::Value)>,
    reviews: HashMap<u64, Vec<Review>>,
    comments: HashMap<u64, Vec<ReviewComment>>,
    replies: Vec<(u64, u64, String)>,
    repo_comments: Vec<(u64, String)>,
    ensured_labels: Vec<RepoLabel>,
}

/// An in-memory stand-in for [`crate::github::GithubGateway`]. All state
/// lives behind a single mutex so tests can both drive the gateway through
/// the trait and assert on what happened via the `inspect_*` helpers.
pub struct FakeGateway {
    state: Mutex<State>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self { state: Mutex::new(State { next_pr_number: 100, ..State::default() }) }
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the issue `get_issue` will return.
    pub fn set_issue(&self, issue: IssueRef) {
        self.state.lock().issues.insert(issue.number, issue);
    }

    /// Pre-seed the outcome `merge_pull_request` will return for a given PR.
    pub fn set_merge_outcome(&self, pr_number: u64, outcome: MergeOutcome) {
        self.state.lock().merge_outcomes.insert(pr_number, outcome);
    }

    /// Pre-seed the reviews `get_pull_request_reviews` will return.
    pub fn set_reviews(&self, pr_number: u64, reviews: Vec<Review>) {
        self.state.lock().reviews.insert(pr_number, reviews);
    }

    /// Pre-seed the inline comments `get_pull_request_comments` will return.
    pub fn set_comments(&self, pr_number: u64, comments: Vec<ReviewComment>) {
        self.state.lock().comments.insert(pr_number, comments);
    }

    pub fn issue_comment(&self, issue_number: u64) -> Option<String> {
        self.state.lock().issue_comments.get(&issue_number).cloned()
    }

    pub fn pr_labels(&self, pr_number: u64) -> Vec<String> {
        self.state.lock().pr_labels.get(&pr_number).cloned().unwrap_or_default()
    }

    pub fn issue_labels(&self, issue_number: u64) -> Vec<String> {
        self.state.lock().issue_labels.get(&issue_number).cloned().unwrap_or_default()
    }

    pub fn dispatched(&self) -> Vec<(String, String, serde_json::Value)> {
        self.state.lock().dispatched.clone()
    }

    pub fn replies(&self) -> Vec<(u64, u64, String)> {
        self.state.lock().replies.clone()
    }

    pub fn repo_comments(&self, pr_number: u64) -> Vec<String> {
        self.state.lock().repo_comments.iter().filter(|(n, _)| *n == pr_number).map(|(_, b)| b.clone()).collect()
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.state.lock().branches.iter().any(|b| b == name)
    }
}

#[async_trait]
impl VcsGateway for FakeGateway {
    async fn get_issue(&self, issue_number: u64) -> Result<IssueRef> {
        self.state
            .lock()
            .issues
            .get(&issue_number)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no such issue seeded: {issue_number}")))
    }

    async fn create_branch(&self, name: &str, _from: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.branches.iter().any(|b| b == name) {
            state.branches.push(name.to_string());
        }
        Ok(())
    }

    async fn find_pull_request(&self, head: &str, base: &str) -> Result<Option<PullRequest>> {
        Ok(self.state.lock().pull_requests.iter().find(|pr| pr.head == head && pr.base == base).cloned())
    }

    async fn get_pull_request(&self, pr_number: u64) -> Result<PullRequest> {
        self.state
            .lock()
            .pull_requests
            .iter()
            .find(|pr| pr.number == pr_number)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no such pull request seeded: {pr_number}")))
    }

    async fn create_pull_request(&self, head: &str, base: &str, _title: &str, _body: &str) -> Result<PullRequest> {
        let mut state = self.state.lock();
        if let Some(existing) = state.pull_requests.iter().find(|pr| pr.head == head && pr.base == base) {
            return Ok(existing.clone());
        }
        let number = state.next_pr_number;
        state.next_pr_number += 1;
        let pr = PullRequest { number, url: format!("https://example.test/pull/{number}"), head: head.to_string(), base: base.to_string(), draft: false };
        state.pull_requests.push(pr.clone());
        Ok(pr)
    }

    async fn update_issue_comment(&self, issue_number: u64, body: &str) -> Result<()> {
        self.state.lock().issue_comments.insert(issue_number, body.to_string());
        Ok(())
    }

    async fn update_pull_request_branch(&self, _pr_number: u64) -> Result<bool> {
        Ok(true)
    }

    async fn merge_pull_request(&self, pr_number: u64) -> Result<MergeOutcome> {
        let mut state = self.state.lock();
        if let Some(outcome) = state.merge_outcomes.get(&pr_number).copied() {
            if outcome == MergeOutcome::Merged {
                state.merged.push(pr_number);
            }
            return Ok(outcome);
        }
        if state.merged.contains(&pr_number) {
            return Ok(MergeOutcome::AlreadyMerged);
        }
        state.merged.push(pr_number);
        Ok(MergeOutcome::Merged)
    }

    async fn set_phase_label(&self, issue_number: u64, label: &str) -> Result<()> {
        set_exclusive(self.state.lock().issue_labels.entry(issue_number).or_default(), label, "cco-phase-");
        Ok(())
    }

    async fn set_status_label(&self, pr_number: u64, label: &str) -> Result<()> {
        set_exclusive(self.state.lock().pr_labels.entry(pr_number).or_default(), label, "cco-status-");
        Ok(())
    }

    async fn dispatch_workflow(&self, workflow_id: &str, git_ref: &str, inputs: serde_json::Value, _options: DispatchOptions) -> Result<()> {
        self.state.lock().dispatched.push((workflow_id.to_string(), git_ref.to_string(), inputs));
        Ok(())
    }

    async fn get_pull_request_reviews(&self, pr_number: u64) -> Result<Vec<Review>> {
        Ok(self.state.lock().reviews.get(&pr_number).cloned().unwrap_or_default())
    }

    async fn get_pull_request_comments(&self, pr_number: u64) -> Result<Vec<ReviewComment>> {
        Ok(self.state.lock().comments.get(&pr_number).cloned().unwrap_or_default())
    }

    async fn reply_to_review_comment(&self, pr_number: u64, comment_id: u64, body: &str) -> Result<()> {
        self.state.lock().replies.push((pr_number, comment_id, body.to_string()));
        Ok(())
    }

    async fn add_pull_request_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        self.state.lock().repo_comments.push((pr_number, body.to_string()));
        Ok(())
    }

    async fn ensure_labels_exist(&self, labels: &[RepoLabel]) -> Result<()> {
        self.state.lock().ensured_labels = labels.to_vec();
        Ok(())
    }
}

fn set_exclusive(labels: &mut Vec<String>, label: &str, prefix: &str) {
    if labels.iter().any(|l| l == label) {
        return;
    }
    labels.retain(|l| !l.starts_with(prefix));
    labels.push(label.to_string());
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
