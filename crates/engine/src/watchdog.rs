// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Watchdog (§4.10): finds EMs and workers that have not progressed
//! within the stall timeout, so `schedule` can nudge the reactor back
//! into motion for orchestrations that lost their triggering event.

use chrono::{DateTime, Utc};

use cco_core::{ComponentKind, EmStatus, OrchestrationState, WorkerStatus};

/// One EM or worker found stuck in a non-terminal, non-waiting status
/// past the stall timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledRecord {
    pub kind: ComponentKind,
    pub em_id: Option<u32>,
    pub worker_id: Option<u32>,
}

/// Scans every EM and worker in `state` for one whose `updated_at` is
/// older than `stall_timeout_minutes` while still in a status the
/// reactor is expected to be actively driving forward (`pending` or
/// in-flight, not one already waiting on an external review).
pub fn find_stalled(state: &OrchestrationState, now: DateTime<Utc>, stall_timeout_minutes: u32) -> Vec<StalledRecord> {
    let threshold = chrono::Duration::minutes(stall_timeout_minutes as i64);
    let mut stalled = Vec::new();

    for em in &state.ems {
        if matches!(em.status, EmStatus::Pending | EmStatus::WorkersRunning) && now - em.updated_at > threshold {
            stalled.push(StalledRecord { kind: ComponentKind::Em, em_id: Some(em.id), worker_id: None });
        }
        for worker in &em.workers {
            if matches!(worker.status, WorkerStatus::Pending | WorkerStatus::InProgress) && now - worker.updated_at > threshold {
                stalled.push(StalledRecord { kind: ComponentKind::Worker, em_id: Some(em.id), worker_id: Some(worker.id) });
            }
        }
    }
    stalled
}

/// The comment posted to the issue when a stalled component is found and
/// re-dispatched.
pub fn stalled_message(record: &StalledRecord) -> String {
    match (record.em_id, record.worker_id) {
        (Some(em_id), Some(worker_id)) => {
            format!("Worker {worker_id} of EM {em_id} has not progressed within the stall timeout; resuming automatically.")
        }
        (Some(em_id), None) => format!("EM {em_id} has not progressed within the stall timeout; resuming automatically."),
        _ => "An orchestration component has stalled; resuming automatically.".to_string(),
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
