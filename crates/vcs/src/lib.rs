// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cco-vcs: the VCS Gateway (§4.4) — an idempotent adapter over the
//! version-control host, plus an in-memory fake for testing the reactor
//! without network access.

pub mod gateway;
pub mod github;
pub mod retry;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use gateway::VcsGateway;
pub use github::{GithubGateway, REVIEW_ADDRESSED_MARKER};
pub use types::{DispatchOptions, MergeOutcome, PullRequest, RepoLabel, Review, ReviewComment, ReviewState};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeGateway;
