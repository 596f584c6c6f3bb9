// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt templates for the three roles (§4.1's analysis/breakdown
//! steps, §4.1.2's feedback loop, §4.1.3's final PR).

use cco_core::{EmRecord, IssueRef};
use cco_vcs::ReviewComment;

/// The Director's analysis prompt: asks for a JSON array of
/// `{em_id, task, focus_area, estimated_workers}`.
pub fn analysis_prompt(issue: &IssueRef, max_ems: u32, max_workers_per_em: u32) -> String {
    format!(
        "You are the Director of an automated engineering team. Decompose the \
         following issue into at most {max_ems} Engineering Manager (EM) tasks, \
         each owning an independent slice of the work and each expecting at \
         most {max_workers_per_em} workers.\n\n\
         Issue title: {}\n\
         Issue body:\n{}\n\n\
         Respond with a JSON array of objects, each shaped as \
         {{\"em_id\": <int>, \"task\": <string>, \"focus_area\": <string>, \
         \"estimated_workers\": <int>}}. Respond with JSON only.",
        issue.title, issue.body
    )
}

/// An EM's breakdown prompt: asks for a JSON array of
/// `{worker_id, task, description, files}`.
pub fn breakdown_prompt(em: &EmRecord, max_workers: u32) -> String {
    format!(
        "You are an Engineering Manager responsible for the following slice of \
         work, decompose it into at most {max_workers} independent leaf coding \
         tasks for your workers.\n\n\
         Slice task: {}\n\
         Focus area: {}\n\n\
         Respond with a JSON array of objects, each shaped as \
         {{\"worker_id\": <int>, \"task\": <string>, \"description\": <string>, \
         \"files\": [<string>, ...]}}. Respond with JSON only.",
        em.task, em.focus_area
    )
}

/// The fixed task prompt given to a worker's coding-agent invocation.
pub fn worker_task_prompt(task: &str, description: &str) -> String {
    format!(
        "You are a software engineer working on an isolated branch. Complete \
         the following task, editing only the files necessary for it:\n\n\
         Task: {task}\n\
         Details: {description}\n\n\
         Make the minimal set of changes needed to satisfy the task."
    )
}

/// Combines inline review comments and the general review body into a
/// single feedback prompt for the review-feedback loop (§4.1.2).
pub fn feedback_prompt(review_body: &str, comments: &[ReviewComment]) -> String {
    let mut out = String::from(
        "A reviewer requested changes on your pull request. Address every \
         item below, then stop.\n\n",
    );
    if !review_body.trim().is_empty() {
        out.push_str("General review comment:\n");
        out.push_str(review_body.trim());
        out.push_str("\n\n");
    }
    if !comments.is_empty() {
        out.push_str("Inline comments:\n");
        for comment in comments {
            let location = match comment.line {
                Some(line) => format!("{}:{line}", comment.path),
                None => comment.path.clone(),
            };
            out.push_str(&format!("- {location}: {}\n", comment.body));
        }
    }
    out
}

/// Title and body for the final pull request (§4.1.3), templated from
/// the issue title and the ordered list of EM tasks.
pub fn final_pr_title_and_body(issue: &IssueRef, ems: &[EmRecord]) -> (String, String) {
    let title = issue.title.clone();
    let mut body = format!("Automated implementation of #{}: {}\n\n", issue.number, issue.title);
    body.push_str("Completed work:\n");
    for em in ems {
        body.push_str(&format!("- {} ({})\n", em.task, em.focus_area));
    }
    (title, body)
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
