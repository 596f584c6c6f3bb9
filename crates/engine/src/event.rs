// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external event surface the reactor consumes (§6). One enum variant
//! per row of the event table in §4.1.

use cco_vcs::ReviewState as GatewayReviewState;

/// The classification a review carries through the reactor, independent
/// of how the VCS Gateway represents it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Approved,
    ChangesRequested,
    Commented,
}

impl From<GatewayReviewState> for ReviewOutcome {
    fn from(state: GatewayReviewState) -> Self {
        match state {
            GatewayReviewState::Approved => ReviewOutcome::Approved,
            GatewayReviewState::ChangesRequested => ReviewOutcome::ChangesRequested,
            GatewayReviewState::Commented => ReviewOutcome::Commented,
        }
    }
}

/// One externally-triggered occurrence the reactor handles via
/// [`crate::reactor::Reactor::handle_event`] (§4.1's event table).
#[derive(Debug, Clone)]
pub enum Event {
    IssueLabeled { issue_number: u64 },
    ProgressCheck { issue_number: u64 },
    Push { branch: String },
    PullRequestOpened { pr_number: u64, branch: String },
    PullRequestReview { pr_number: u64, outcome: ReviewOutcome, review_body: String },
    PullRequestMerged { pr_number: u64, branch: Option<String> },
    Schedule,
}

impl Event {
    /// A short, stable tag for tracing spans and log fields — never the
    /// `Debug` form, since that would include payload values that vary
    /// per invocation.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::IssueLabeled { .. } => "issue_labeled",
            Event::ProgressCheck { .. } => "progress_check",
            Event::Push { .. } => "push",
            Event::PullRequestOpened { .. } => "pull_request_opened",
            Event::PullRequestReview { .. } => "pull_request_review",
            Event::PullRequestMerged { .. } => "pull_request_merged",
            Event::Schedule => "schedule",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
