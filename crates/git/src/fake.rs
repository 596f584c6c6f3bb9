// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory [`LocalRepo`] for testing `cco-state`'s pull–merge–push
//! protocol without a real working tree, mirroring `cco-vcs`'s
//! `FakeGateway`.

use parking_lot::Mutex;

use crate::repo::LocalRepo;
use crate::types::RebaseOutcome;
use cco_core::{Error, Result};

#[derive(Debug, Default)]
struct State {
    current_branch: String,
    /// branch name -> file path -> contents, modeling what's been pushed.
    remote_files: std::collections::HashMap<String, std::collections::HashMap<String, String>>,
    remote_branches: std::collections::HashSet<String>,
    dirty: bool,
    modified_files: Vec<String>,
    /// Staged-but-not-yet-pushed writes, applied to `remote_files` on the
    /// next `commit_and_push`.
    pending_writes: std::collections::HashMap<String, String>,
    push_failures_remaining: u32,
    /// Pending writes set aside by `stash`, restored by `unstash`.
    stashed_writes: std::collections::HashMap<String, String>,
    stashed_modified_files: Vec<String>,
}

pub struct FakeRepo {
    state: Mutex<State>,
}

impl FakeRepo {
    pub fn new(base_branch: impl Into<String>) -> Self {
        let base_branch = base_branch.into();
        let mut remote_branches = std::collections::HashSet::new();
        remote_branches.insert(base_branch.clone());
        Self {
            state: Mutex::new(State { current_branch: base_branch, remote_branches, ..Default::default() }),
        }
    }

    /// Seeds the contents of `path` on `branch` as if a prior push landed it.
    pub fn seed_file(&self, branch: &str, path: &str, contents: impl Into<String>) {
        let mut guard = self.state.lock();
        guard.remote_branches.insert(branch.to_string());
        guard.remote_files.entry(branch.to_string()).or_default().insert(path.to_string(), contents.into());
    }

    /// Stages file contents so the next `commit_and_push` picks them up,
    /// modeling a worker/EM writing files to the working tree.
    pub fn stage_write(&self, path: &str, contents: impl Into<String>) {
        let mut guard = self.state.lock();
        guard.pending_writes.insert(path.to_string(), contents.into());
        guard.dirty = true;
        if !guard.modified_files.iter().any(|f| f == path) {
            guard.modified_files.push(path.to_string());
        }
    }

    /// Forces the next N pushes to fail, exercising the retry-with-rebase
    /// path in `cco-state`'s save loop.
    pub fn fail_next_pushes(&self, count: u32) {
        self.state.lock().push_failures_remaining = count;
    }

    pub fn file_on_branch(&self, branch: &str, path: &str) -> Option<String> {
        self.state.lock().remote_files.get(branch).and_then(|files| files.get(path)).cloned()
    }
}

impl LocalRepo for FakeRepo {
    fn create_branch(&self, name: &str, _from: &str) -> Result<()> {
        self.state.lock().remote_branches.insert(name.to_string());
        Ok(())
    }

    fn checkout(&self, name: &str) -> Result<()> {
        self.state.lock().current_branch = name.to_string();
        Ok(())
    }

    fn commit_and_push(&self, _message: &str, _files: &[String]) -> Result<bool> {
        let mut guard = self.state.lock();
        if guard.pending_writes.is_empty() {
            return Ok(false);
        }
        if guard.push_failures_remaining > 0 {
            guard.push_failures_remaining -= 1;
            return Err(Error::Transient("fake push rejected".to_string()));
        }
        let branch = guard.current_branch.clone();
        let writes = std::mem::take(&mut guard.pending_writes);
        guard.remote_files.entry(branch).or_default().extend(writes);
        guard.dirty = false;
        guard.modified_files.clear();
        Ok(true)
    }

    fn rebase(&self, _target: &str) -> Result<RebaseOutcome> {
        Ok(RebaseOutcome { success: true, has_conflicts: false, conflict_files: Vec::new() })
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(self.state.lock().dirty)
    }

    fn modified_files(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().modified_files.clone())
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.state.lock().current_branch.clone())
    }

    fn current_sha(&self) -> Result<String> {
        Ok("0000000000000000000000000000000000000".to_string())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        self.state.lock().remote_branches.remove(name);
        Ok(())
    }

    fn remote_branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().remote_branches.contains(name))
    }

    fn list_remote_branches(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().remote_branches.iter().cloned().collect())
    }

    fn read_file_from_branch(&self, branch: &str, path: &str) -> Result<Option<String>> {
        Ok(self.state.lock().remote_files.get(branch).and_then(|files| files.get(path)).cloned())
    }

    fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        self.stage_write(path, contents.to_string());
        Ok(())
    }

    fn workdir(&self) -> Result<std::path::PathBuf> {
        Ok(std::path::PathBuf::from(format!("/fake/{}", self.state.lock().current_branch)))
    }

    fn stash(&self) -> Result<bool> {
        let mut guard = self.state.lock();
        if guard.pending_writes.is_empty() {
            return Ok(false);
        }
        guard.stashed_writes = std::mem::take(&mut guard.pending_writes);
        guard.stashed_modified_files = std::mem::take(&mut guard.modified_files);
        guard.dirty = false;
        Ok(true)
    }

    fn unstash(&self) -> Result<()> {
        let mut guard = self.state.lock();
        if guard.stashed_writes.is_empty() {
            return Ok(());
        }
        guard.pending_writes = std::mem::take(&mut guard.stashed_writes);
        guard.modified_files = std::mem::take(&mut guard.stashed_modified_files);
        guard.dirty = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
