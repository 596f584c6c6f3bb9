// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency token derivation (§4.1.1): a stable key derived from
//! `(event kind, issue, component ids)`, carried on every dispatched
//! side effect so repeated deliveries of the same logical event do not
//! double-execute.
//!
//! Unlike [`cco_core::IdempotencyToken::new`], which mints a random ID,
//! this key must be the *same* value across repeated reactor invocations
//! triggered by the same logical event — so it is derived by hashing the
//! inputs rather than generated.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use cco_core::IdempotencyToken;

/// Derives a deterministic [`IdempotencyToken`] from the event kind, the
/// issue it concerns, and the ids of any EM/worker it targets.
pub fn derive_token(event_kind: &str, issue_number: u64, component_ids: &[u32]) -> IdempotencyToken {
    let mut hasher = DefaultHasher::new();
    event_kind.hash(&mut hasher);
    issue_number.hash(&mut hasher);
    component_ids.hash(&mut hasher);
    let digest = hasher.finish();
    IdempotencyToken::from_string(format!("tok-{digest:016x}"))
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
