// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic, bidirectional mapping between a (component kind, issue,
//! ids) tuple and a branch name.
//!
//! Pure functions only — no I/O, no clock. The work branch is
//! `cco/<issue>-<slug>`; an EM branch appends `-em<id>`; a worker branch
//! appends `-w<id>` to its EM branch.

/// Which level of the hierarchy a branch name names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Director,
    Em,
    Worker,
}

/// The parsed identity of a branch, or `None` if the name does not match
/// any recognized shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedComponent {
    pub kind: ComponentKind,
    pub issue_number: u64,
    pub em_id: Option<u32>,
    pub worker_id: Option<u32>,
}

/// Normalize a title into a branch-safe slug: lowercase ASCII, collapse
/// non-alphanumerics to single hyphens, trim leading/trailing hyphens,
/// truncate to 50 characters.
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_hyphen = false;
    for ch in title.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            out.push(lower);
            last_was_hyphen = false;
        } else if !last_was_hyphen && !out.is_empty() {
            out.push('-');
            last_was_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out.truncate(50);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// The work branch for an issue: `cco/<issue>-<slug>`.
pub fn work_branch(issue_number: u64, title: &str) -> String {
    format!("cco/{}-{}", issue_number, slug(title))
}

/// The EM branch descending from a work branch.
pub fn em_branch(work_branch: &str, em_id: u32) -> String {
    format!("{work_branch}-em{em_id}")
}

/// The worker branch descending from an EM branch.
pub fn worker_branch(em_branch: &str, worker_id: u32) -> String {
    format!("{em_branch}-w{worker_id}")
}

/// Parse a branch name back into its component identity. Injective and
/// reversible with [`work_branch`]/[`em_branch`]/[`worker_branch`] for any
/// branch this module generated.
pub fn parse_component_from_branch(name: &str) -> Option<ParsedComponent> {
    let rest = name.strip_prefix("cco/")?;

    // Worker: <issue>-<slug>-em<n>-w<m>
    if let Some(idx) = rest.rfind("-w") {
        let (head, tail) = rest.split_at(idx);
        let worker_digits = &tail[2..];
        if !worker_digits.is_empty() && worker_digits.chars().all(|c| c.is_ascii_digit()) {
            if let Some(parsed) = parse_em_tail(head) {
                return Some(ParsedComponent {
                    kind: ComponentKind::Worker,
                    issue_number: parsed.issue_number,
                    em_id: parsed.em_id,
                    worker_id: worker_digits.parse().ok(),
                });
            }
        }
    }

    // EM: <issue>-<slug>-em<n>
    if let Some(parsed) = parse_em_tail(rest) {
        return Some(parsed);
    }

    // Director: <issue>-<slug>
    let issue_number = leading_digits(rest)?;
    Some(ParsedComponent { kind: ComponentKind::Director, issue_number, em_id: None, worker_id: None })
}

fn parse_em_tail(rest: &str) -> Option<ParsedComponent> {
    let idx = rest.rfind("-em")?;
    let (head, tail) = rest.split_at(idx);
    let em_digits = &tail[3..];
    if em_digits.is_empty() || !em_digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let issue_number = leading_digits(head)?;
    Some(ParsedComponent {
        kind: ComponentKind::Em,
        issue_number,
        em_id: em_digits.parse().ok(),
        worker_id: None,
    })
}

fn leading_digits(s: &str) -> Option<u64> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// The base branch a given branch descends from: worker -> EM branch,
/// EM -> director (work) branch, director -> the orchestration's base
/// branch.
pub fn base_branch_for(name: &str, work_branch: &str, em_branches: &[(u32, String)], orchestration_base: &str) -> Option<String> {
    let parsed = parse_component_from_branch(name)?;
    match parsed.kind {
        ComponentKind::Worker => {
            let em_id = parsed.em_id?;
            em_branches.iter().find(|(id, _)| *id == em_id).map(|(_, b)| b.clone())
        }
        ComponentKind::Em => Some(work_branch.to_string()),
        ComponentKind::Director => Some(orchestration_base.to_string()),
    }
}

#[cfg(test)]
#[path = "branch_tests.rs"]
mod tests;
