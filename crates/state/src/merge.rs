// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The field-wise deterministic merge rules of §4.2. Merging is not
//! last-write-wins: each field has its own rule, chosen so that two
//! reactor invocations racing on the same work branch converge on a
//! state that is at least as advanced as either side saw.

use cco_core::{EmRecord, EmStatus, ErrorEntry, OrchestrationState, Phase, WorkerRecord};

/// `phase` takes the greater of the two in phase-advancement order,
/// unless exactly one side is `failed` — non-failed is preferred so a
/// transient failure recorded by a concurrent invocation does not
/// permanently sink an orchestration the other invocation is still
/// advancing.
pub fn merge_phase(local: Phase, remote: Phase) -> Phase {
    match (local == Phase::Failed, remote == Phase::Failed) {
        (true, false) => remote,
        (false, true) => local,
        _ => local.max(remote),
    }
}

/// `prNumber`-style fields are first-writer-wins: once either side has
/// recorded a value, later merges must not clobber it with `None` or a
/// different value from a race. `remote` is what's already durable, so
/// it wins whenever it is set.
fn first_writer<T: Clone>(local: &Option<T>, remote: &Option<T>) -> Option<T> {
    remote.clone().or_else(|| local.clone())
}

pub fn merge_worker(local: &WorkerRecord, remote: &WorkerRecord) -> WorkerRecord {
    debug_assert_eq!(local.id, remote.id);
    WorkerRecord {
        id: local.id,
        task: local.task.clone(),
        files: local.files.clone(),
        branch: local.branch.clone(),
        status: local.status.max(remote.status),
        pr_number: first_writer(&local.pr_number, &remote.pr_number),
        reviews_addressed: local.reviews_addressed.max(remote.reviews_addressed),
        error: first_writer(&local.error, &remote.error),
        session_id: first_writer(&local.session_id, &remote.session_id),
        created_at: local.created_at.min(remote.created_at),
        updated_at: local.updated_at.max(remote.updated_at),
    }
}

fn merge_workers(local: &[WorkerRecord], remote: &[WorkerRecord]) -> Vec<WorkerRecord> {
    local
        .iter()
        .map(|w| match remote.iter().find(|r| r.id == w.id) {
            Some(r) => merge_worker(w, r),
            None => w.clone(),
        })
        .collect()
}

/// `status` takes the further-advanced side, except that a merge must
/// never downgrade `workers_running`/`workers_complete` down to
/// `skipped`/`failed` while any merged worker is still non-terminal —
/// that combination means one side observed a premature failure signal
/// for an EM whose workers the other side knows are still active.
pub fn merge_em(local: &EmRecord, remote: &EmRecord) -> EmRecord {
    debug_assert_eq!(local.id, remote.id);
    let workers = merge_workers(&local.workers, &remote.workers);
    let any_worker_active = workers.iter().any(|w| !w.status.is_terminal());

    let mut status = local.status.max(remote.status);
    if matches!(status, EmStatus::Skipped | EmStatus::Failed) {
        let other = if local.status == status { remote.status } else { local.status };
        if matches!(other, EmStatus::WorkersRunning | EmStatus::WorkersComplete) && any_worker_active {
            status = other;
        }
    }

    EmRecord {
        id: local.id,
        task: local.task.clone(),
        focus_area: local.focus_area.clone(),
        branch: local.branch.clone(),
        status,
        workers,
        pr_number: first_writer(&local.pr_number, &remote.pr_number),
        session_id: first_writer(&local.session_id, &remote.session_id),
        created_at: local.created_at.min(remote.created_at),
        updated_at: local.updated_at.max(remote.updated_at),
    }
}

fn merge_ems(local: &[EmRecord], remote: &[EmRecord]) -> Vec<EmRecord> {
    let mut merged: Vec<EmRecord> = local
        .iter()
        .map(|em| match remote.iter().find(|r| r.id == em.id) {
            Some(r) => merge_em(em, r),
            None => em.clone(),
        })
        .collect();
    for em in remote {
        if !local.iter().any(|l| l.id == em.id) {
            merged.push(em.clone());
        }
    }
    merged.sort_by_key(|em| em.id);
    merged
}

/// Set-union of error history keyed by `(timestamp, message)`, sorted by
/// timestamp so the merged document reads chronologically regardless of
/// which side contributed which entry.
fn merge_errors(local: &Option<Vec<ErrorEntry>>, remote: &Option<Vec<ErrorEntry>>) -> Option<Vec<ErrorEntry>> {
    if local.is_none() && remote.is_none() {
        return None;
    }
    let mut merged: Vec<ErrorEntry> = Vec::new();
    for entry in local.iter().flatten().chain(remote.iter().flatten()) {
        if !merged.iter().any(|e| e.timestamp == entry.timestamp && e.message == entry.message) {
            merged.push(entry.clone());
        }
    }
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.message.cmp(&b.message)));
    Some(merged)
}

/// Merges `local` (the in-memory state about to be saved) with `remote`
/// (the document already committed on the work branch by some other
/// invocation). Identity fields (`version`, `issue`, `repo`, branches,
/// `config`) are assumed equal across both sides — they are fixed at
/// `initializeState` and never diverge — so `local`'s copy is kept.
pub fn merge_state(local: &OrchestrationState, remote: &OrchestrationState) -> OrchestrationState {
    OrchestrationState {
        version: local.version,
        issue: local.issue.clone(),
        repo: local.repo.clone(),
        phase: merge_phase(local.phase, remote.phase),
        work_branch: local.work_branch.clone(),
        base_branch: local.base_branch.clone(),
        ems: merge_ems(&local.ems, &remote.ems),
        final_pr: first_writer(&local.final_pr, &remote.final_pr),
        config: local.config.clone(),
        analysis_summary: first_writer(&local.analysis_summary, &remote.analysis_summary),
        created_at: local.created_at.min(remote.created_at),
        updated_at: local.updated_at.max(remote.updated_at),
        error: merge_errors(&local.error, &remote.error),
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
