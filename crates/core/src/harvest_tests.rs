// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    em_id: u32,
    task: String,
}

#[test]
fn harvests_from_json_fenced_block() {
    let text = "Here is the plan:\n```json\n{\"em_id\": 1, \"task\": \"core\"}\n```\nDone.";
    let item: Item = harvest(text).expect("harvest");
    assert_eq!(item, Item { em_id: 1, task: "core".to_string() });
}

#[test]
fn harvests_from_unlabeled_fenced_block() {
    let text = "```\n{\"em_id\": 2, \"task\": \"testing\"}\n```";
    let item: Item = harvest(text).expect("harvest");
    assert_eq!(item, Item { em_id: 2, task: "testing".to_string() });
}

#[test]
fn harvests_widest_brace_pair_without_fence() {
    let text = "Sure, here you go: {\"em_id\": 3, \"task\": \"docs\"} hope that helps";
    let item: Item = harvest(text).expect("harvest");
    assert_eq!(item, Item { em_id: 3, task: "docs".to_string() });
}

#[test]
fn harvests_whole_string_as_last_resort() {
    let text = "{\"em_id\": 4, \"task\": \"cleanup\"}";
    let item: Item = harvest(text).expect("harvest");
    assert_eq!(item, Item { em_id: 4, task: "cleanup".to_string() });
}

#[test]
fn prefers_json_labeled_fence_over_bare_fence() {
    let text = "```\nnot json at all\n```\n```json\n{\"em_id\": 5, \"task\": \"api\"}\n```";
    let item: Item = harvest(text).expect("harvest");
    assert_eq!(item, Item { em_id: 5, task: "api".to_string() });
}

#[test]
fn fails_with_single_diagnostic_when_nothing_parses() {
    let err = harvest::<Item>("no json anywhere here").unwrap_err();
    assert!(matches!(err, Error::JsonHarvestFailed(_)));
}

#[test]
fn tolerates_braces_inside_string_values() {
    let text = "{\"em_id\": 6, \"task\": \"handle the {weird} case\"}";
    let item: Item = harvest(text).expect("harvest");
    assert_eq!(item.task, "handle the {weird} case");
}
