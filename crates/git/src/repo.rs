// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local Repo Operations (§4.3): branch checkout/create, commit-and-push
//! with force-with-lease fallback, rebase with conflict detection, and
//! stash/restore across branch switches.
//!
//! Every method is blocking (`git2` is a synchronous libgit2 binding);
//! callers on an async executor run these through `spawn_blocking`.

use std::path::{Path, PathBuf};

use cco_core::Error;
use git2::{build::CheckoutBuilder, FetchOptions, PushOptions, RemoteCallbacks, Repository, StashFlags};
use parking_lot::Mutex;

use crate::types::RebaseOutcome;

/// The path to the persisted state document, relative to the repo root.
/// `commitAndPush` excludes this path from its stage unless the caller
/// explicitly listed it, so EM/worker branches never carry it (§3).
pub const STATE_DOCUMENT_PATH: &str = ".orchestrator/state.json";

pub trait LocalRepo {
    fn create_branch(&self, name: &str, from: &str) -> cco_core::Result<()>;
    fn checkout(&self, name: &str) -> cco_core::Result<()>;
    fn commit_and_push(&self, message: &str, files: &[String]) -> cco_core::Result<bool>;
    fn rebase(&self, target: &str) -> cco_core::Result<RebaseOutcome>;
    fn has_uncommitted_changes(&self) -> cco_core::Result<bool>;
    fn modified_files(&self) -> cco_core::Result<Vec<String>>;
    fn current_branch(&self) -> cco_core::Result<String>;
    fn current_sha(&self) -> cco_core::Result<String>;
    fn delete_branch(&self, name: &str) -> cco_core::Result<()>;
    fn remote_branch_exists(&self, name: &str) -> cco_core::Result<bool>;
    /// Lists every branch known on `origin` after a fresh fetch, used by
    /// `findWorkBranchForIssue` to scan for an existing work branch
    /// without the caller needing to guess its exact name up front.
    fn list_remote_branches(&self) -> cco_core::Result<Vec<String>>;
    /// Reads a file's contents as it exists on `branch`, without
    /// checking it out. Returns `Ok(None)` if the file does not exist on
    /// that branch.
    fn read_file_from_branch(&self, branch: &str, path: &str) -> cco_core::Result<Option<String>>;
    /// Writes `contents` to `path` in the checked-out working tree,
    /// creating parent directories as needed, without staging or
    /// committing it.
    fn write_file(&self, path: &str, contents: &str) -> cco_core::Result<()>;
    /// The repository's working-tree root, used by callers that must pass
    /// a filesystem path to an external process (the LLM coding agent).
    fn workdir(&self) -> cco_core::Result<PathBuf>;
    /// Stashes any uncommitted working-tree changes, including untracked
    /// files, and returns whether anything was actually stashed. Call
    /// before switching branches out from under dirty state (§4.2 step 1,
    /// §4.3/§9's scoped-acquisition guarantee).
    fn stash(&self) -> cco_core::Result<bool>;
    /// Restores the most recently stashed changes. A no-op (`Ok(())`) if
    /// nothing is stashed, so callers can call it unconditionally on every
    /// exit path of a scoped branch switch.
    fn unstash(&self) -> cco_core::Result<()>;
}

pub struct Git2Repo {
    repo: Mutex<Repository>,
    token: String,
    identity_name: String,
    identity_email: String,
}

impl Git2Repo {
    pub fn open(path: impl AsRef<Path>, token: impl Into<String>) -> cco_core::Result<Self> {
        let repo = Repository::open(path.as_ref())
            .map_err(|e| Error::Transient(format!("failed to open repo at {}: {e}", path.as_ref().display())))?;
        Ok(Self {
            repo: Mutex::new(repo),
            token: token.into(),
            identity_name: "cco-orchestrator".to_string(),
            identity_email: "cco-orchestrator@users.noreply.github.com".to_string(),
        })
    }

    fn remote_callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        let token = self.token.clone();
        callbacks.credentials(move |_url, username_from_url, _allowed| {
            git2::Cred::userpass_plaintext(username_from_url.unwrap_or("x-access-token"), &token)
        });
        callbacks
    }

    fn fetch(&self, repo: &Repository, branch: &str) -> cco_core::Result<()> {
        let mut remote = repo.find_remote("origin").map_err(|e| Error::Transient(e.to_string()))?;
        let mut opts = FetchOptions::new();
        opts.remote_callbacks(self.remote_callbacks());
        remote
            .fetch(&[branch], Some(&mut opts), None)
            .map_err(|e| Error::Transient(format!("fetch {branch} failed: {e}")))
    }

    fn push(&self, repo: &Repository, branch: &str, force: bool) -> cco_core::Result<()> {
        let mut remote = repo.find_remote("origin").map_err(|e| Error::Transient(e.to_string()))?;
        let mut opts = PushOptions::new();
        opts.remote_callbacks(self.remote_callbacks());
        let refspec = if force {
            format!("+refs/heads/{branch}:refs/heads/{branch}")
        } else {
            format!("refs/heads/{branch}:refs/heads/{branch}")
        };
        remote.push(&[refspec.as_str()], Some(&mut opts)).map_err(|e| Error::Transient(format!("push {branch} failed: {e}")))
    }
}

impl LocalRepo for Git2Repo {
    fn create_branch(&self, name: &str, from: &str) -> cco_core::Result<()> {
        let repo = self.repo.lock();
        self.fetch(&repo, from)?;
        let origin_ref = format!("refs/remotes/origin/{from}");
        let target = repo.find_reference(&origin_ref).map_err(|e| Error::Transient(e.to_string()))?;
        let commit = target.peel_to_commit().map_err(|e| Error::Transient(e.to_string()))?;

        // Discard any dirty copy of the state document before switching, so
        // it never leaks across branches (§3: state lives only on workBranch).
        let _ = repo.cleanup_state();

        match repo.branch(name, &commit, true) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::Exists => Ok(()),
            Err(e) => Err(Error::Transient(format!("create branch {name} failed: {e}"))),
        }
    }

    fn checkout(&self, name: &str) -> cco_core::Result<()> {
        let repo = self.repo.lock();
        let local_ref = format!("refs/heads/{name}");
        if repo.find_reference(&local_ref).is_err() {
            if self.fetch(&repo, name).is_ok() {
                if let Ok(remote_ref) = repo.find_reference(&format!("refs/remotes/origin/{name}")) {
                    let commit = remote_ref.peel_to_commit().map_err(|e| Error::Transient(e.to_string()))?;
                    repo.branch(name, &commit, false).map_err(|e| Error::Transient(e.to_string()))?;
                }
            }
        }
        let (object, reference) =
            repo.revparse_ext(name).map_err(|e| Error::Transient(format!("could not resolve branch {name}: {e}")))?;
        repo.checkout_tree(&object, Some(CheckoutBuilder::new().force())).map_err(|e| Error::Transient(e.to_string()))?;
        match reference {
            Some(r) => repo.set_head(r.name().unwrap_or(name)),
            None => repo.set_head_detached(object.id()),
        }
        .map_err(|e| Error::Transient(e.to_string()))
    }

    fn commit_and_push(&self, message: &str, files: &[String]) -> cco_core::Result<bool> {
        let repo = self.repo.lock();
        let mut index = repo.index().map_err(|e| Error::Transient(e.to_string()))?;
        let exclude_state = !files.iter().any(|f| f == STATE_DOCUMENT_PATH);

        if files.is_empty() {
            index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None).map_err(|e| Error::Transient(e.to_string()))?;
        } else {
            for file in files {
                index.add_path(Path::new(file)).map_err(|e| Error::Transient(e.to_string()))?;
            }
        }
        if exclude_state {
            let _ = index.remove_path(Path::new(STATE_DOCUMENT_PATH));
        }
        index.write().map_err(|e| Error::Transient(e.to_string()))?;

        let tree_id = index.write_tree().map_err(|e| Error::Transient(e.to_string()))?;
        let head = repo.head().map_err(|e| Error::Transient(e.to_string()))?;
        let parent = head.peel_to_commit().map_err(|e| Error::Transient(e.to_string()))?;
        let tree = repo.find_tree(tree_id).map_err(|e| Error::Transient(e.to_string()))?;

        if tree.id() == parent.tree_id() {
            return Ok(false);
        }

        let signature = git2::Signature::now(&self.identity_name, &self.identity_email).map_err(|e| Error::Transient(e.to_string()))?;
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
            .map_err(|e| Error::Transient(e.to_string()))?;

        let branch = current_branch_of(&repo)?;
        if self.push(&repo, &branch, false).is_err() {
            self.fetch(&repo, &branch)?;
            self.push(&repo, &branch, true)?;
        }
        Ok(true)
    }

    fn rebase(&self, target: &str) -> cco_core::Result<RebaseOutcome> {
        let repo = self.repo.lock();
        self.fetch(&repo, target)?;
        let upstream_ref =
            repo.find_reference(&format!("refs/remotes/origin/{target}")).map_err(|e| Error::Transient(e.to_string()))?;
        let upstream = repo.reference_to_annotated_commit(&upstream_ref).map_err(|e| Error::Transient(e.to_string()))?;
        let head_ref = repo.head().map_err(|e| Error::Transient(e.to_string()))?;
        let head = repo.reference_to_annotated_commit(&head_ref).map_err(|e| Error::Transient(e.to_string()))?;

        let mut rebase = repo.rebase(Some(&head), Some(&upstream), None, None).map_err(|e| Error::Transient(e.to_string()))?;

        let mut conflict_files = Vec::new();
        while let Some(op) = rebase.next() {
            if op.is_err() {
                break;
            }
            if let Ok(index) = repo.index() {
                if index.has_conflicts() {
                    conflict_files.extend(
                        index
                            .conflicts()
                            .into_iter()
                            .flatten()
                            .filter_map(|c| c.our.and_then(|e| std::str::from_utf8(&e.path).ok().map(str::to_string))),
                    );
                    let _ = rebase.abort();
                    return Ok(RebaseOutcome { success: false, has_conflicts: true, conflict_files });
                }
            }
            let signature = git2::Signature::now(&self.identity_name, &self.identity_email).map_err(|e| Error::Transient(e.to_string()))?;
            if let Err(e) = rebase.commit(None, &signature, None) {
                if e.code() != git2::ErrorCode::Applied {
                    let _ = rebase.abort();
                    return Err(Error::Transient(format!("rebase commit failed: {e}")));
                }
            }
        }
        rebase.finish(None).map_err(|e| Error::Transient(e.to_string()))?;
        Ok(RebaseOutcome { success: true, has_conflicts: false, conflict_files: Vec::new() })
    }

    fn has_uncommitted_changes(&self) -> cco_core::Result<bool> {
        let repo = self.repo.lock();
        let statuses = repo.statuses(None).map_err(|e| Error::Transient(e.to_string()))?;
        Ok(!statuses.is_empty())
    }

    fn modified_files(&self) -> cco_core::Result<Vec<String>> {
        let repo = self.repo.lock();
        let statuses = repo.statuses(None).map_err(|e| Error::Transient(e.to_string()))?;
        Ok(statuses.iter().filter_map(|entry| entry.path().map(str::to_string)).collect())
    }

    fn current_branch(&self) -> cco_core::Result<String> {
        current_branch_of(&self.repo.lock())
    }

    fn current_sha(&self) -> cco_core::Result<String> {
        let repo = self.repo.lock();
        let head = repo.head().map_err(|e| Error::Transient(e.to_string()))?;
        let commit = head.peel_to_commit().map_err(|e| Error::Transient(e.to_string()))?;
        Ok(commit.id().to_string())
    }

    fn delete_branch(&self, name: &str) -> cco_core::Result<()> {
        let repo = self.repo.lock();
        if let Ok(mut branch) = repo.find_branch(name, git2::BranchType::Local) {
            let _ = branch.delete();
        }
        let mut remote = repo.find_remote("origin").map_err(|e| Error::Transient(e.to_string()))?;
        let mut opts = PushOptions::new();
        opts.remote_callbacks(self.remote_callbacks());
        let refspec = format!(":refs/heads/{name}");
        // Tolerates absence: pushing a delete for a ref that's already gone
        // is not treated as a hard failure.
        let _ = remote.push(&[refspec.as_str()], Some(&mut opts));
        Ok(())
    }

    fn remote_branch_exists(&self, name: &str) -> cco_core::Result<bool> {
        let repo = self.repo.lock();
        if self.fetch(&repo, name).is_err() {
            return Ok(false);
        }
        Ok(repo.find_reference(&format!("refs/remotes/origin/{name}")).is_ok())
    }

    fn list_remote_branches(&self) -> cco_core::Result<Vec<String>> {
        let repo = self.repo.lock();
        let mut remote = repo.find_remote("origin").map_err(|e| Error::Transient(e.to_string()))?;
        let mut opts = FetchOptions::new();
        opts.remote_callbacks(self.remote_callbacks());
        // An empty refspec list fetches whatever the remote's configured
        // default refspecs cover, refreshing every remote-tracking branch.
        remote.fetch(&[] as &[&str], Some(&mut opts), None).map_err(|e| Error::Transient(format!("fetch all failed: {e}")))?;

        let prefix = "refs/remotes/origin/";
        let branches = repo
            .branches(Some(git2::BranchType::Remote))
            .map_err(|e| Error::Transient(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|(branch, _)| branch.get().name().map(str::to_string))
            .filter_map(|name| name.strip_prefix(prefix).map(str::to_string))
            .filter(|name| name != "HEAD")
            .collect();
        Ok(branches)
    }

    fn read_file_from_branch(&self, branch: &str, path: &str) -> cco_core::Result<Option<String>> {
        let repo = self.repo.lock();
        self.fetch(&repo, branch)?;
        let reference = match repo.find_reference(&format!("refs/remotes/origin/{branch}")) {
            Ok(r) => r,
            Err(_) => return Ok(None),
        };
        let commit = reference.peel_to_commit().map_err(|e| Error::Transient(e.to_string()))?;
        let tree = commit.tree().map_err(|e| Error::Transient(e.to_string()))?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(_) => return Ok(None),
        };
        let blob = entry.to_object(&repo).map_err(|e| Error::Transient(e.to_string()))?;
        let blob = blob.as_blob().ok_or_else(|| Error::Transient(format!("{path} is not a blob on {branch}")))?;
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }

    fn write_file(&self, path: &str, contents: &str) -> cco_core::Result<()> {
        let full_path = self.workdir()?.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Transient(e.to_string()))?;
        }
        std::fs::write(&full_path, contents).map_err(|e| Error::Transient(e.to_string()))
    }

    fn workdir(&self) -> cco_core::Result<PathBuf> {
        self.repo.lock().workdir().map(Path::to_path_buf).ok_or_else(|| Error::Config("repository has no working directory".into()))
    }

    fn stash(&self) -> cco_core::Result<bool> {
        let mut repo = self.repo.lock();
        let signature = git2::Signature::now(&self.identity_name, &self.identity_email).map_err(|e| Error::Transient(e.to_string()))?;
        match repo.stash_save(&signature, "cco: scoped branch switch", Some(StashFlags::INCLUDE_UNTRACKED)) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(Error::Transient(format!("stash failed: {e}"))),
        }
    }

    fn unstash(&self) -> cco_core::Result<()> {
        let mut repo = self.repo.lock();
        match repo.stash_pop(0, None) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(e) => Err(Error::Transient(format!("unstash failed: {e}"))),
        }
    }
}

fn current_branch_of(repo: &Repository) -> cco_core::Result<String> {
    let head = repo.head().map_err(|e| Error::Transient(e.to_string()))?;
    head.shorthand().map(str::to_string).ok_or_else(|| Error::Transient("HEAD is not a branch".into()))
}

#[cfg(test)]
#[path = "repo_tests.rs"]
mod tests;
