// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Persistent State Store (§4.2): `loadState`, `saveState`,
//! `loadStateFromBranch`, `initializeState`, `findWorkBranchForIssue`, and
//! `isOrchestrationInProgress`, built on top of [`cco_git::LocalRepo`].
//!
//! `saveState` drives the pull–merge–push protocol: checkout the work
//! branch, rebase from origin, merge the in-memory state against whatever
//! is already committed there, write, commit, push — retrying a rejected
//! push up to three times.

use cco_core::{Error, OrchestrationState, Result, CURRENT_STATE_VERSION};
use cco_git::{LocalRepo, STATE_DOCUMENT_PATH};

use crate::merge::merge_state;

const MAX_SAVE_RETRIES: u32 = 3;

pub struct StateStore<R: LocalRepo> {
    repo: R,
}

impl<R: LocalRepo> StateStore<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Reads the state document from whatever branch is currently checked
    /// out.
    pub fn load_state(&self) -> Result<Option<OrchestrationState>> {
        let branch = self.repo.current_branch()?;
        self.load_state_from_branch(&branch)
    }

    /// Reads the state document from `branch` without switching to it.
    pub fn load_state_from_branch(&self, branch: &str) -> Result<Option<OrchestrationState>> {
        let contents = match self.repo.read_file_from_branch(branch, STATE_DOCUMENT_PATH)? {
            Some(contents) => contents,
            None => return Ok(None),
        };
        let state: OrchestrationState = serde_json::from_str(&contents)
            .map_err(|e| Error::StateSave(format!("corrupt state document on {branch}: {e}")))?;
        if state.version != CURRENT_STATE_VERSION {
            return Err(Error::StateSave(format!("unsupported state document version {} on {branch}", state.version)));
        }
        Ok(Some(state))
    }

    /// Creates the work branch from `baseBranch` and commits the initial
    /// state document. Idempotent: a work branch that already exists is
    /// reused rather than recreated.
    pub fn initialize_state(&self, state: &OrchestrationState) -> Result<()> {
        self.repo.create_branch(&state.work_branch, &state.base_branch)?;
        self.repo.checkout(&state.work_branch)?;
        self.write_document(state)?;
        self.repo.commit_and_push("cco: initialize orchestration state", &[STATE_DOCUMENT_PATH.to_string()])?;
        Ok(())
    }

    /// Saves `state`, merging with whatever is already on `state.work_branch`
    /// rather than overwriting it (§4.2). Failures degrade to
    /// `Error::StateSave` — callers must not treat this as a reactor
    /// failure; the next event retries.
    pub fn save_state(&self, state: &OrchestrationState, message: Option<&str>) -> Result<()> {
        let original_branch = self.repo.current_branch()?;
        let stashed = self.repo.stash().unwrap_or(false);
        let result = self.save_state_inner(state, message);
        let _ = self.repo.checkout(&original_branch);
        if stashed {
            let _ = self.repo.unstash();
        }
        result
    }

    fn save_state_inner(&self, state: &OrchestrationState, message: Option<&str>) -> Result<()> {
        self.repo.checkout(&state.work_branch).map_err(|e| Error::StateSave(e.to_string()))?;
        let _ = self.repo.rebase(&state.work_branch);

        let commit_message = message.unwrap_or("cco: update orchestration state").to_string();
        let mut attempt = 0;
        loop {
            let merged = match self.load_state_from_branch(&state.work_branch)? {
                Some(existing) => merge_state(state, &existing),
                None => state.clone(),
            };
            self.write_document(&merged).map_err(|e| Error::StateSave(e.to_string()))?;
            match self.repo.commit_and_push(&commit_message, &[STATE_DOCUMENT_PATH.to_string()]) {
                Ok(_) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt > MAX_SAVE_RETRIES {
                        return Err(Error::StateSave(format!("push rejected after {MAX_SAVE_RETRIES} retries: {e}")));
                    }
                    self.repo.rebase(&state.work_branch).map_err(|e| Error::StateSave(e.to_string()))?;
                }
            }
        }
    }

    /// Scans remote branches for an existing work branch belonging to
    /// `issue_number`, without assuming the caller already knows its slug.
    pub fn find_work_branch_for_issue(&self, issue_number: u64) -> Result<Option<String>> {
        let branches = self.repo.list_remote_branches()?;
        Ok(branches.into_iter().find(|name| {
            cco_core::parse_component_from_branch(name)
                .map(|parsed| parsed.kind == cco_core::ComponentKind::Director && parsed.issue_number == issue_number)
                .unwrap_or(false)
        }))
    }

    /// True if `issue_number` has a work branch whose state document is
    /// not yet in a terminal phase.
    pub fn is_orchestration_in_progress(&self, issue_number: u64) -> Result<bool> {
        let branch = match self.find_work_branch_for_issue(issue_number)? {
            Some(branch) => branch,
            None => return Ok(false),
        };
        match self.load_state_from_branch(&branch)? {
            Some(state) => Ok(!state.is_terminal()),
            None => Ok(false),
        }
    }

    fn write_document(&self, state: &OrchestrationState) -> Result<()> {
        let serialized = serde_json::to_string_pretty(state).map_err(|e| Error::StateSave(e.to_string()))?;
        self.repo.write_file(STATE_DOCUMENT_PATH, &serialized)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
