// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response shapes for the VCS Gateway (§4.4), independent of any
//! particular host's wire format.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub head: String,
    pub base: String,
    pub draft: bool,
}

/// The outcome classification `mergePullRequest` returns. Every variant is
/// non-fatal for the gateway itself — the caller (reactor) decides what to
/// do with it (§4.4, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    AlreadyMerged,
    ClosedNotMerged,
    NotMergeable,
    BaseModified,
    HeadModified,
    FailingStatus,
}

impl MergeOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, MergeOutcome::Merged | MergeOutcome::AlreadyMerged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewComment {
    pub id: u64,
    pub path: String,
    pub line: Option<u64>,
    pub body: String,
    /// Set when this comment is itself a reply; the id of the top-level
    /// comment it replies to. Used to tell replies apart from the
    /// top-level comments a review feedback loop should reply to.
    pub in_reply_to_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub state: ReviewState,
    pub body: String,
    pub comments: Vec<ReviewComment>,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub idempotency_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoLabel {
    pub name: String,
    pub color: String,
    pub description: String,
}
