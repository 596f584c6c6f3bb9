// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extracts the first JSON value from unstructured LLM output (§4.7).
//!
//! Four strategies are tried in order, each wrapped in a parse attempt; the
//! first one that parses wins. Model output is chatty — a fenced block is
//! the common case, but the orchestrator must still make forward progress
//! when the model forgets the fence.

use crate::error::Error;
use serde::de::DeserializeOwned;

/// Extract and parse a JSON value of type `T` from `text`, trying each
/// strategy in turn.
pub fn harvest<T: DeserializeOwned>(text: &str) -> Result<T, Error> {
    for candidate in candidates(text) {
        if let Ok(value) = serde_json::from_str::<T>(&candidate) {
            return Ok(value);
        }
    }
    Err(Error::JsonHarvestFailed(format!(
        "no strategy produced parseable JSON from {} bytes of model output",
        text.len()
    )))
}

/// The candidate substrings, in strategy order. Exposed separately from
/// [`harvest`] so callers and tests can inspect what was tried.
fn candidates(text: &str) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(block) = fenced_block(text, Some("json")) {
        out.push(block);
    }
    if let Some(block) = fenced_block(text, None) {
        out.push(block);
    }
    if let Some(pair) = widest_pair(text, '{', '}') {
        out.push(pair);
    } else if let Some(pair) = widest_pair(text, '[', ']') {
        out.push(pair);
    }
    out.push(text.to_string());

    out
}

/// Find the first fenced code block. `lang` restricts the match to blocks
/// opened with that language tag (` ```json `); `None` matches any fence.
fn fenced_block(text: &str, lang: Option<&str>) -> Option<String> {
    let mut rest = text;
    loop {
        let start = rest.find("```")?;
        let after_open = &rest[start + 3..];
        let line_end = after_open.find('\n').unwrap_or(after_open.len());
        let tag = after_open[..line_end].trim();

        let matches_lang = match lang {
            Some(want) => tag.eq_ignore_ascii_case(want),
            None => true,
        };

        let body_start = line_end + 1;
        if body_start > after_open.len() {
            return None;
        }
        let body = &after_open[body_start.min(after_open.len())..];
        let Some(close) = body.find("```") else {
            return None;
        };

        if matches_lang {
            return Some(body[..close].trim().to_string());
        }
        rest = &body[close + 3..];
    }
}

/// Find the widest balanced-bracket substring delimited by `open`/`close`,
/// tolerating brackets nested inside string literals.
fn widest_pair(text: &str, open: char, close: char) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut best: Option<(usize, usize)> = None;
    let mut stack: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => stack.push(i),
            c if c == close => {
                if let Some(start) = stack.pop() {
                    let width = i - start;
                    let better = match best {
                        Some((bs, be)) => width > be - bs,
                        None => true,
                    };
                    if better && stack.is_empty() {
                        best = Some((start, i));
                    }
                }
            }
            _ => {}
        }
    }

    best.map(|(s, e)| chars[s..=e].iter().collect())
}

#[cfg(test)]
#[path = "harvest_tests.rs"]
mod tests;
