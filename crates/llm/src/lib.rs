// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cco-llm: LLM Dispatch (§4.5) — runs the coding-agent subprocess,
//! classifies rate-limit and authentication failures, rotates through the
//! Credential Ring, and retries other transient failures with backoff.

pub mod dispatch;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use dispatch::{CodingAgentDispatch, LlmDispatch};
pub use types::{TaskOptions, TaskResult};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDispatch;
