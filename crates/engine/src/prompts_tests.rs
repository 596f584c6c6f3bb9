// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Utc};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid datetime")
}

fn issue() -> IssueRef {
    IssueRef { owner: "acme".into(), repo: "widgets".into(), number: 7, title: "Build a thing".into(), body: "Make it work".into() }
}

#[test]
fn analysis_prompt_includes_issue_and_limits() {
    let prompt = analysis_prompt(&issue(), 3, 4);
    assert!(prompt.contains("Build a thing"));
    assert!(prompt.contains("Make it work"));
    assert!(prompt.contains("at most 3"));
    assert!(prompt.contains("at most 4"));
}

#[test]
fn breakdown_prompt_includes_em_task_and_focus() {
    let em = EmRecord::new(1, "Build the API", "backend", "cco/7-build-a-thing-em1", now());
    let prompt = breakdown_prompt(&em, 3);
    assert!(prompt.contains("Build the API"));
    assert!(prompt.contains("backend"));
}

#[test]
fn worker_task_prompt_includes_task_and_description() {
    let prompt = worker_task_prompt("add an endpoint", "implement GET /widgets");
    assert!(prompt.contains("add an endpoint"));
    assert!(prompt.contains("implement GET /widgets"));
}

#[test]
fn feedback_prompt_combines_body_and_inline_comments() {
    let comments = vec![cco_vcs::ReviewComment {
        id: 1,
        path: "src/api/server.ts".into(),
        line: Some(17),
        body: "add error handling".into(),
        in_reply_to_id: None,
    }];
    let prompt = feedback_prompt("please handle errors", &comments);
    assert!(prompt.contains("please handle errors"));
    assert!(prompt.contains("src/api/server.ts:17"));
    assert!(prompt.contains("add error handling"));
}

#[test]
fn feedback_prompt_omits_empty_general_body() {
    let prompt = feedback_prompt("   ", &[]);
    assert!(!prompt.contains("General review comment"));
}

#[test]
fn final_pr_title_and_body_lists_em_tasks() {
    let ems = vec![EmRecord::new(1, "Build the API", "backend", "cco/7-build-a-thing-em1", now()), EmRecord::new(2, "Write tests", "testing", "cco/7-build-a-thing-em2", now())];
    let (title, body) = final_pr_title_and_body(&issue(), &ems);
    assert_eq!(title, "Build a thing");
    assert!(body.contains("#7"));
    assert!(body.contains("Build the API"));
    assert!(body.contains("Write tests"));
}
