// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cco-git: Local Repo Operations (§4.3) over `git2` — branch creation,
//! checkout, commit-and-push, and rebase with conflict detection.

pub mod repo;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use repo::{Git2Repo, LocalRepo, STATE_DOCUMENT_PATH};
pub use types::RebaseOutcome;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRepo;
