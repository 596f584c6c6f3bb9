// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `cco-*` label vocabulary (§4.9): pure mapping helpers between
//! internal enums and label strings, and back. No I/O — the VCS Gateway's
//! `ensureLabelsExist`/`setPhaseLabel`/`setStatusLabel` operations consume
//! this module's output but perform the actual API calls themselves.

use crate::branch::ComponentKind;
use crate::model::{Phase, WorkerStatus};

pub const MANAGED_LABEL: &str = "cco-managed";
pub const STALLED_LABEL: &str = "cco-stalled";

const STATUS_PREFIX: &str = "cco-status-";
const PHASE_PREFIX: &str = "cco-phase-";
const TYPE_PREFIX: &str = "cco-type-";
const EM_PREFIX: &str = "cco-em-";

/// A label's static metadata, used to seed the repository's label set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDef {
    pub name: String,
    pub color: &'static str,
    pub description: &'static str,
}

pub fn status_label(status: WorkerStatus) -> String {
    format!("{STATUS_PREFIX}{status}")
}

pub fn phase_label(phase: Phase) -> String {
    format!("{PHASE_PREFIX}{phase}")
}

pub fn type_label(kind: ComponentKind) -> String {
    let name = match kind {
        ComponentKind::Director => "director",
        ComponentKind::Em => "em",
        ComponentKind::Worker => "worker",
    };
    format!("{TYPE_PREFIX}{name}")
}

pub fn em_label(em_id: u32) -> String {
    format!("{EM_PREFIX}{em_id}")
}

pub fn parse_status_from_labels(labels: &[String]) -> Option<WorkerStatus> {
    labels.iter().find_map(|l| {
        let suffix = l.strip_prefix(STATUS_PREFIX)?;
        ALL_WORKER_STATUSES.iter().copied().find(|s| s.to_string() == suffix)
    })
}

pub fn parse_phase_from_labels(labels: &[String]) -> Option<Phase> {
    labels.iter().find_map(|l| {
        let suffix = l.strip_prefix(PHASE_PREFIX)?;
        ALL_PHASES.iter().copied().find(|p| p.to_string() == suffix)
    })
}

pub fn parse_em_id_from_labels(labels: &[String]) -> Option<u32> {
    labels.iter().find_map(|l| l.strip_prefix(EM_PREFIX)?.parse().ok())
}

const ALL_WORKER_STATUSES: [WorkerStatus; 8] = [
    WorkerStatus::Pending,
    WorkerStatus::InProgress,
    WorkerStatus::PrCreated,
    WorkerStatus::ChangesRequested,
    WorkerStatus::Approved,
    WorkerStatus::Merged,
    WorkerStatus::Skipped,
    WorkerStatus::Failed,
];

const ALL_PHASES: [Phase; 11] = [
    Phase::Initialized,
    Phase::Analyzing,
    Phase::EmAssignment,
    Phase::WorkerExecution,
    Phase::WorkerReview,
    Phase::EmMerging,
    Phase::EmReview,
    Phase::FinalMerge,
    Phase::FinalReview,
    Phase::Complete,
    Phase::Failed,
];

/// The full set of labels the orchestrator ever applies, for
/// `ensureLabelsExist` to seed on first use.
pub fn enumerate_all_labels() -> Vec<LabelDef> {
    let mut labels = vec![
        LabelDef { name: MANAGED_LABEL.to_string(), color: "5319e7", description: "Managed by the code-change orchestrator" },
        LabelDef { name: STALLED_LABEL.to_string(), color: "d93f0b", description: "Orchestration has not progressed within the stall timeout" },
    ];
    for status in ALL_WORKER_STATUSES {
        labels.push(LabelDef {
            name: status_label(status),
            color: status_color(status),
            description: "Automation-managed status label",
        });
    }
    for phase in ALL_PHASES {
        labels.push(LabelDef {
            name: phase_label(phase),
            color: "0e8a16",
            description: "Automation-managed phase label",
        });
    }
    for kind in [ComponentKind::Director, ComponentKind::Em, ComponentKind::Worker] {
        labels.push(LabelDef {
            name: type_label(kind),
            color: "1d76db",
            description: "Automation-managed component-kind label",
        });
    }
    labels
}

fn status_color(status: WorkerStatus) -> &'static str {
    match status {
        WorkerStatus::Pending => "ededed",
        WorkerStatus::InProgress => "fbca04",
        WorkerStatus::PrCreated => "0075ca",
        WorkerStatus::ChangesRequested => "d93f0b",
        WorkerStatus::Approved => "0e8a16",
        WorkerStatus::Merged => "6f42c1",
        WorkerStatus::Skipped => "c5def5",
        WorkerStatus::Failed => "b60205",
    }
}

#[cfg(test)]
#[path = "label_tests.rs"]
mod tests;
