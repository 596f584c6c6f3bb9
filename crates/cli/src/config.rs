// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translates environment variables into a [`Config`] (§4.11), the one
//! place this binary reads the process environment. Every other module
//! receives already-typed values.

use cco_core::{CredentialSpec, Error, OrchestrationConfig, Result};
use cco_engine::{Event, ReviewOutcome};

/// Resolves one input following the hosting platform's convention:
/// `INPUT_<NAME>` takes precedence over the plain upper-cased name.
fn input(name: &str) -> Option<String> {
    let upper = name.to_ascii_uppercase().replace('-', "_");
    std::env::var(format!("INPUT_{upper}")).ok().or_else(|| std::env::var(&upper).ok()).filter(|v| !v.is_empty())
}

fn require(name: &str) -> Result<String> {
    input(name).ok_or_else(|| Error::Config(format!("missing required input `{name}`")))
}

fn parse_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse().map_err(|_| Error::Config(format!("input `{name}` is not a valid number: {raw:?}")))
}

fn parse_default_u32(raw: Option<String>, name: &str, default: u32) -> Result<u32> {
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| Error::Config(format!("input `{name}` is not a valid number: {v:?}"))),
    }
}

/// Everything one reactor invocation needs, resolved once at process
/// start and handed to [`crate::run`].
pub struct Config {
    pub github_token: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub claude_configs: Vec<CredentialSpec>,
    pub orchestration: OrchestrationConfig,
    pub dispatch_stagger_ms: u64,
    pub stall_timeout_minutes: u32,
    pub workflow_id: String,
    pub coding_agent_executable: String,
    pub workdir: String,
    pub event: Event,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = require("github-token")?;
        let repo_owner = require("repo-owner")?;
        let repo_name = require("repo-name")?;

        let claude_configs_raw = require("claude-configs")?;
        let claude_configs: Vec<CredentialSpec> = serde_json::from_str(&claude_configs_raw)
            .map_err(|e| Error::Config(format!("claude-configs is not a valid JSON array: {e}")))?;

        let orchestration = OrchestrationConfig {
            max_ems: parse_default_u32(input("max-ems"), "max-ems", 3)?,
            max_workers_per_em: parse_default_u32(input("max-workers-per-em"), "max-workers-per-em", 3)?,
            review_wait_minutes: parse_default_u32(input("review-wait-minutes"), "review-wait-minutes", 5)?,
            pr_label: input("pr-label").unwrap_or_else(|| "cco".to_string()),
        };

        let dispatch_stagger_ms = match input("dispatch-stagger-ms") {
            None => 2000,
            Some(v) => v.parse().map_err(|_| Error::Config(format!("input `dispatch-stagger-ms` is not a valid number: {v:?}")))?,
        };
        let stall_timeout_minutes = parse_default_u32(input("stall-timeout-minutes"), "stall-timeout-minutes", 60)?;

        let workflow_id = input("workflow-id").unwrap_or_else(|| "cco.yml".to_string());
        let coding_agent_executable = input("coding-agent-executable").unwrap_or_else(|| "claude".to_string());
        let workdir = input("workdir").unwrap_or_else(|| ".".to_string());

        let event = resolve_event()?;

        Ok(Self {
            github_token,
            repo_owner,
            repo_name,
            claude_configs,
            orchestration,
            dispatch_stagger_ms,
            stall_timeout_minutes,
            workflow_id,
            coding_agent_executable,
            workdir,
            event,
        })
    }
}

fn resolve_event() -> Result<Event> {
    let event_type = require("event-type")?;
    match event_type.as_str() {
        "issue_labeled" => {
            let issue_number = parse_u64("issue-number", &require("issue-number")?)?;
            Ok(Event::IssueLabeled { issue_number })
        }
        "progress_check" => {
            let issue_number = parse_u64("issue-number", &require("issue-number")?)?;
            Ok(Event::ProgressCheck { issue_number })
        }
        "push" => Ok(Event::Push { branch: require("branch")? }),
        "pull_request_opened" => {
            let pr_number = parse_u64("pr-number", &require("pr-number")?)?;
            Ok(Event::PullRequestOpened { pr_number, branch: require("branch")? })
        }
        "pull_request_review" => {
            let pr_number = parse_u64("pr-number", &require("pr-number")?)?;
            let outcome = match require("review-state")?.as_str() {
                "approved" => ReviewOutcome::Approved,
                "changes_requested" => ReviewOutcome::ChangesRequested,
                "commented" => ReviewOutcome::Commented,
                other => return Err(Error::Config(format!("unrecognized review-state: {other:?}"))),
            };
            let review_body = input("review-body").unwrap_or_default();
            Ok(Event::PullRequestReview { pr_number, outcome, review_body })
        }
        "pull_request_merged" => {
            let pr_number = parse_u64("pr-number", &require("pr-number")?)?;
            Ok(Event::PullRequestMerged { pr_number, branch: input("branch") })
        }
        "schedule" | "workflow_dispatch" => Ok(Event::Schedule),
        other => Err(Error::Config(format!("unrecognized event-type: {other:?}"))),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
