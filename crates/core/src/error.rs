// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy shared by every component crate.
//!
//! Each component reports failures through this enum rather than its own
//! ad-hoc error type so the reactor can match on the taxonomy (configuration
//! vs. transient vs. terminal) without downcasting through `anyhow`.

use thiserror::Error;

/// Error taxonomy for the orchestrator, cutting across all component crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration. Surfaces as a non-zero exit with no
    /// state change.
    #[error("configuration error: {0}")]
    Config(String),

    /// A transient failure at an external boundary (5xx, timeout, connection
    /// reset). The caller should retry with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// The LLM provider signaled a rate limit. Callers rotate the credential
    /// ring and retry without consuming the task's retry budget.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The LLM provider rejected the credential outright. Non-retryable;
    /// escalates the orchestration to `phase = failed`.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// None of the JSON Harvester's strategies produced a parseable value.
    #[error("could not extract JSON from model output: {0}")]
    JsonHarvestFailed(String),

    /// The VCS host reported the PR as unmergeable (conflicts, failing
    /// status checks, base/head modified after approval).
    #[error("merge conflict or unmergeable PR: {0}")]
    MergeConflict(String),

    /// The pull–merge–push protocol could not land the state document after
    /// exhausting its retry budget. Never propagated as a reactor failure;
    /// logged and retried on the next event.
    #[error("state save failed: {0}")]
    StateSave(String),

    /// The orchestration is already terminal (`complete` or `failed`) and
    /// refuses further transitions.
    #[error("orchestration is terminal: {0}")]
    Terminal(String),

    /// A branch name did not match any recognized component shape.
    #[error("unparseable branch name: {0}")]
    UnparseableBranch(String),
}

impl Error {
    /// Whether this error should escalate the orchestration phase to
    /// `failed` rather than being retried or logged.
    pub fn is_escalating(&self) -> bool {
        matches!(self, Error::AuthenticationFailed(_) | Error::MergeConflict(_) | Error::JsonHarvestFailed(_))
    }

    /// Whether this error is a configuration problem that must stop the
    /// reactor before any durable side effect runs.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
