// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cco-core: data model, ID types, and pure helpers shared by every
//! component of the code-change orchestrator.

pub mod macros;

pub mod branch;
pub mod clock;
pub mod credential;
pub mod error;
pub mod harvest;
pub mod id;
pub mod label;
pub mod model;

pub use branch::{
    base_branch_for, em_branch, parse_component_from_branch, slug, work_branch, worker_branch,
    ComponentKind, ParsedComponent,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use credential::{
    is_authentication_failure_signature, is_rate_limit_signature, CredentialRing,
    CredentialRingError, CredentialSpec,
};
pub use error::{Error, Result};
pub use harvest::harvest;
pub use id::{short, IdBuf};
pub use label::{
    em_label, enumerate_all_labels, parse_em_id_from_labels, parse_phase_from_labels,
    parse_status_from_labels, phase_label, status_label, type_label, LabelDef, MANAGED_LABEL,
    STALLED_LABEL,
};
#[cfg(any(test, feature = "test-support"))]
pub use model::IssueRefBuilder;
pub use model::{
    EmRecord, EmStatus, ErrorEntry, FinalPr, IssueRef, OrchestrationConfig, OrchestrationState,
    Phase, WorkerRecord, WorkerStatus, CURRENT_STATE_VERSION,
};

/// Stable idempotency token type (§4.1.1): a key added to dispatch inputs
/// so repeated deliveries of the same logical event do not double-execute.
define_id! {
    /// A stable key derived from (event kind, issue, component ids) and
    /// propagated through dispatched-workflow inputs.
    pub struct IdempotencyToken("tok-");
}
