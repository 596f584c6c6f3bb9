// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cco_vcs::ReviewState as GatewayReviewState;

#[test]
fn kind_is_stable_and_payload_independent() {
    let a = Event::IssueLabeled { issue_number: 1 };
    let b = Event::IssueLabeled { issue_number: 999 };
    assert_eq!(a.kind(), b.kind());
    assert_eq!(a.kind(), "issue_labeled");
}

#[test]
fn review_outcome_converts_from_gateway_review_state() {
    assert_eq!(ReviewOutcome::from(GatewayReviewState::Approved), ReviewOutcome::Approved);
    assert_eq!(ReviewOutcome::from(GatewayReviewState::ChangesRequested), ReviewOutcome::ChangesRequested);
    assert_eq!(ReviewOutcome::from(GatewayReviewState::Commented), ReviewOutcome::Commented);
}
