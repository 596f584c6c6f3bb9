// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub implementation of the VCS Gateway, over `octocrab`.

use std::time::Duration;

use async_trait::async_trait;
use cco_core::{Error, IssueRef};
use octocrab::models::{pulls::MergeableState, IssueState};
use octocrab::params::{pulls::MergeMethod, repos::Reference, State};
use octocrab::Octocrab;
use serde_json::json;

use crate::gateway::VcsGateway;
use crate::retry::with_backoff;
use crate::types::{DispatchOptions, MergeOutcome, PullRequest, RepoLabel, Review, ReviewComment, ReviewState};

const COMMENT_MARKER: &str = "<!-- cco-orchestrator-comment -->";

/// Hidden marker embedded in automated review-feedback replies so a
/// redelivered review event does not reply twice to the same comment
/// (§4.1.2 step 4, §6).
pub const REVIEW_ADDRESSED_MARKER: &str = "<!-- cco-review-addressed -->";
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 5;

pub struct GithubGateway {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GithubGateway {
    pub fn new(token: String, owner: impl Into<String>, repo: impl Into<String>) -> cco_core::Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| Error::Config(format!("failed to build GitHub client: {e}")))?;
        Ok(Self { client, owner: owner.into(), repo: repo.into() })
    }

    async fn retry<T>(
        &self,
        f: impl Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<T, octocrab::Error>> + Send + '_>>,
    ) -> cco_core::Result<T> {
        with_backoff(MAX_ATTEMPTS, BACKOFF_BASE, BACKOFF_CAP, is_retryable, f).await.map_err(classify)
    }
}

fn is_retryable(err: &octocrab::Error) -> bool {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            status >= 500 || status == 429
        }
        octocrab::Error::Http { .. } | octocrab::Error::Hyper { .. } => true,
        _ => false,
    }
}

fn classify(err: octocrab::Error) -> Error {
    match &err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            if status >= 500 || status == 429 {
                Error::Transient(err.to_string())
            } else {
                Error::Config(err.to_string())
            }
        }
        _ => Error::Transient(err.to_string()),
    }
}

fn is_ref_exists_error(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. } if source.message.contains("already exists"))
}

#[async_trait]
impl VcsGateway for GithubGateway {
    async fn get_issue(&self, issue_number: u64) -> cco_core::Result<IssueRef> {
        let issue = self
            .retry(|| Box::pin(async { self.client.issues(&self.owner, &self.repo).get(issue_number).await }))
            .await?;
        Ok(IssueRef {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            number: issue_number,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
        })
    }

    async fn create_branch(&self, name: &str, from: &str) -> cco_core::Result<()> {
        let base = self
            .retry(|| {
                Box::pin(async { self.client.repos(&self.owner, &self.repo).get_ref(&Reference::Branch(from.to_string())).await })
            })
            .await?;
        let sha = match base.object {
            octocrab::models::repos::Object::Commit { sha, .. } => sha,
            octocrab::models::repos::Object::Tag { sha, .. } => sha,
            _ => return Err(Error::Transient(format!("unexpected ref object for {from}"))),
        };

        let result = self
            .client
            .repos(&self.owner, &self.repo)
            .create_ref(&Reference::Branch(name.to_string()), sha)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_ref_exists_error(&e) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }

    async fn find_pull_request(&self, head: &str, base: &str) -> cco_core::Result<Option<PullRequest>> {
        let head_filter = format!("{}:{}", self.owner, head);
        let page = self
            .retry(|| {
                Box::pin(async {
                    self.client
                        .pulls(&self.owner, &self.repo)
                        .list()
                        .head(&head_filter)
                        .base(base)
                        .state(State::Open)
                        .send()
                        .await
                })
            })
            .await?;
        Ok(page.items.into_iter().next().map(into_pull_request))
    }

    async fn get_pull_request(&self, pr_number: u64) -> cco_core::Result<PullRequest> {
        let pr = self.retry(|| Box::pin(async { self.client.pulls(&self.owner, &self.repo).get(pr_number).await })).await?;
        Ok(into_pull_request(pr))
    }

    async fn create_pull_request(&self, head: &str, base: &str, title: &str, body: &str) -> cco_core::Result<PullRequest> {
        if let Some(existing) = self.find_pull_request(head, base).await? {
            return Ok(existing);
        }
        let created = self
            .retry(|| {
                Box::pin(async {
                    self.client.pulls(&self.owner, &self.repo).create(title, head, base).body(body).send().await
                })
            })
            .await?;
        Ok(into_pull_request(created))
    }

    async fn update_issue_comment(&self, issue_number: u64, body: &str) -> cco_core::Result<()> {
        let marked = format!("{body}\n\n{COMMENT_MARKER}");
        let comments = self
            .retry(|| Box::pin(async { self.client.issues(&self.owner, &self.repo).list_comments(issue_number).send().await }))
            .await?;
        if let Some(existing) = comments.items.iter().find(|c| c.body.as_deref().unwrap_or_default().contains(COMMENT_MARKER)) {
            self.retry(|| {
                let body = marked.clone();
                Box::pin(async move { self.client.issues(&self.owner, &self.repo).update_comment(existing.id, body).await })
            })
            .await?;
        } else {
            self.retry(|| {
                let body = marked.clone();
                Box::pin(async move { self.client.issues(&self.owner, &self.repo).create_comment(issue_number, body).await })
            })
            .await?;
        }
        Ok(())
    }

    async fn update_pull_request_branch(&self, pr_number: u64) -> cco_core::Result<bool> {
        let result = self.client.pulls(&self.owner, &self.repo).update_branch(pr_number).await;
        Ok(result.is_ok())
    }

    async fn merge_pull_request(&self, pr_number: u64) -> cco_core::Result<MergeOutcome> {
        let pr = self
            .retry(|| Box::pin(async { self.client.pulls(&self.owner, &self.repo).get(pr_number).await }))
            .await?;

        if pr.merged_at.is_some() {
            return Ok(MergeOutcome::AlreadyMerged);
        }
        if pr.state == Some(IssueState::Closed) {
            return Ok(MergeOutcome::ClosedNotMerged);
        }
        match pr.mergeable_state {
            Some(MergeableState::Dirty) => return Ok(MergeOutcome::NotMergeable),
            Some(MergeableState::Behind) => return Ok(MergeOutcome::BaseModified),
            Some(MergeableState::Blocked) | Some(MergeableState::Unstable) => {
                return Ok(MergeOutcome::FailingStatus)
            }
            _ => {}
        }

        let result = self
            .client
            .pulls(&self.owner, &self.repo)
            .merge(pr_number)
            .method(MergeMethod::Squash)
            .send()
            .await;

        match result {
            Ok(_) => Ok(MergeOutcome::Merged),
            Err(e) if is_retryable(&e) => Err(classify(e)),
            Err(_) => Ok(MergeOutcome::HeadModified),
        }
    }

    async fn set_phase_label(&self, issue_number: u64, label: &str) -> cco_core::Result<()> {
        self.set_exclusive_label(issue_number, label, "cco-phase-").await
    }

    async fn set_status_label(&self, pr_number: u64, label: &str) -> cco_core::Result<()> {
        self.set_exclusive_label(pr_number, label, "cco-status-").await
    }

    async fn dispatch_workflow(
        &self,
        workflow_id: &str,
        git_ref: &str,
        inputs: serde_json::Value,
        options: DispatchOptions,
    ) -> cco_core::Result<()> {
        let mut inputs = inputs;
        if let (Some(token), Some(map)) = (options.idempotency_token, inputs.as_object_mut()) {
            map.insert("idempotency_token".to_string(), json!(token));
        }
        self.retry(|| {
            let inputs = inputs.clone();
            Box::pin(async move {
                self.client
                    .actions()
                    .create_workflow_dispatch(&self.owner, &self.repo, workflow_id, git_ref)
                    .inputs(inputs)
                    .send()
                    .await
            })
        })
        .await
    }

    async fn get_pull_request_reviews(&self, pr_number: u64) -> cco_core::Result<Vec<Review>> {
        let page = self
            .retry(|| Box::pin(async { self.client.pulls(&self.owner, &self.repo).list_reviews(pr_number).send().await }))
            .await?;
        Ok(page.items.into_iter().filter_map(into_review).collect())
    }

    async fn get_pull_request_comments(&self, pr_number: u64) -> cco_core::Result<Vec<ReviewComment>> {
        let route = format!("repos/{}/{}/pulls/{}/comments", self.owner, self.repo, pr_number);
        let comments: Vec<GithubReviewComment> =
            self.retry(|| Box::pin(async { self.client.get(&route, None::<&()>).await })).await?;
        Ok(comments
            .into_iter()
            .map(|c| ReviewComment { id: c.id, path: c.path, line: c.line, body: c.body, in_reply_to_id: c.in_reply_to_id })
            .collect())
    }

    async fn reply_to_review_comment(&self, pr_number: u64, comment_id: u64, body: &str) -> cco_core::Result<()> {
        let route = format!("repos/{}/{}/pulls/{}/comments/{}/replies", self.owner, self.repo, pr_number, comment_id);
        let payload = json!({ "body": body });
        self.retry(|| {
            let payload = payload.clone();
            Box::pin(async move { self.client.post::<_, serde_json::Value>(&route, Some(&payload)).await })
        })
        .await?;
        Ok(())
    }

    async fn add_pull_request_comment(&self, pr_number: u64, body: &str) -> cco_core::Result<()> {
        self.retry(|| {
            let body = body.to_string();
            Box::pin(async move { self.client.issues(&self.owner, &self.repo).create_comment(pr_number, body).await })
        })
        .await?;
        Ok(())
    }

    async fn ensure_labels_exist(&self, labels: &[RepoLabel]) -> cco_core::Result<()> {
        let existing = self
            .retry(|| Box::pin(async { self.client.issues(&self.owner, &self.repo).list_labels_for_repo().send().await }))
            .await?;
        let existing_names: std::collections::HashSet<_> = existing.items.into_iter().map(|l| l.name).collect();
        for label in labels {
            if existing_names.contains(&label.name) {
                continue;
            }
            let route = format!("repos/{}/{}/labels", self.owner, self.repo);
            let payload = json!({ "name": label.name, "color": label.color, "description": label.description });
            let _: cco_core::Result<serde_json::Value> = self
                .retry(|| {
                    let payload = payload.clone();
                    Box::pin(async move { self.client.post(&route, Some(&payload)).await })
                })
                .await;
        }
        Ok(())
    }
}

impl GithubGateway {
    async fn set_exclusive_label(&self, number: u64, label: &str, prefix: &str) -> cco_core::Result<()> {
        let current = self
            .retry(|| Box::pin(async { self.client.issues(&self.owner, &self.repo).list_labels_for_issue(number).send().await }))
            .await?;
        let current_names: Vec<String> = current.items.into_iter().map(|l| l.name).collect();
        if current_names.iter().any(|n| n == label) {
            return Ok(());
        }
        for stale in current_names.iter().filter(|n| n.starts_with(prefix)) {
            let _ = self.client.issues(&self.owner, &self.repo).remove_label(number, stale).await;
        }
        self.retry(|| Box::pin(async { self.client.issues(&self.owner, &self.repo).add_labels(number, &[label.to_string()]).await }))
            .await?;
        Ok(())
    }
}

#[derive(Debug, serde::Deserialize)]
struct GithubReviewComment {
    id: u64,
    path: String,
    line: Option<u64>,
    body: String,
    in_reply_to_id: Option<u64>,
}

fn into_pull_request(pr: octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        head: pr.head.ref_field,
        base: pr.base.ref_field,
        draft: pr.draft.unwrap_or(false),
    }
}

fn into_review(review: octocrab::models::pulls::Review) -> Option<Review> {
    let state = match review.state? {
        octocrab::models::pulls::ReviewState::Approved => ReviewState::Approved,
        octocrab::models::pulls::ReviewState::ChangesRequested => ReviewState::ChangesRequested,
        _ => ReviewState::Commented,
    };
    Some(Review { state, body: review.body.unwrap_or_default(), comments: Vec::new() })
}
