// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential Ring (§4.6): an ordered sequence of LLM provider credentials
//! with a rotation cursor, used by `cco-llm`'s dispatch loop to survive
//! rate limits without stalling an orchestration on a single key.
//!
//! Resolution itself — pulling a key out of an env var, a keychain, or a
//! config file — is a single-credential concern handled by each
//! `CredentialSpec`'s construction; the ring only owns *rotation* among
//! already-resolved credentials.

use serde::{Deserialize, Serialize};

/// One entry in the credential ring, as parsed from the `claude-configs`
/// JSON array input (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSpec {
    /// A literal API key, mutually exclusive with `env_api_key`/`env_auth_token`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// The name of an environment variable holding an API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_api_key: Option<String>,
    /// The name of an environment variable holding an OAuth bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_auth_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl CredentialSpec {
    /// Resolve this spec's auth material against the process environment.
    /// `None` means the entry carries no usable credential.
    pub fn resolve_auth(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        if let Some(var) = &self.env_api_key {
            if let Ok(val) = std::env::var(var) {
                if !val.is_empty() {
                    return Some(val);
                }
            }
        }
        if let Some(var) = &self.env_auth_token {
            if let Ok(val) = std::env::var(var) {
                if !val.is_empty() {
                    return Some(val);
                }
            }
        }
        None
    }
}

/// The rotation cursor over a non-empty list of credentials.
#[derive(Debug, Clone)]
pub struct CredentialRing {
    credentials: Vec<CredentialSpec>,
    cursor: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialRingError {
    #[error("claude-configs must contain at least one credential")]
    Empty,
    #[error("no credential in claude-configs resolved any auth material")]
    NoneResolvable,
}

impl CredentialRing {
    /// Construct a ring, rejecting configurations that are empty or whose
    /// entries all lack resolvable auth material (§4.6).
    pub fn new(credentials: Vec<CredentialSpec>) -> Result<Self, CredentialRingError> {
        if credentials.is_empty() {
            return Err(CredentialRingError::Empty);
        }
        if !credentials.iter().any(|c| c.resolve_auth().is_some()) {
            return Err(CredentialRingError::NoneResolvable);
        }
        Ok(Self { credentials, cursor: 0 })
    }

    pub fn current(&self) -> &CredentialSpec {
        &self.credentials[self.cursor]
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Advance the cursor modulo the ring length and return the new
    /// current credential. A ring of size one returns the same credential.
    pub fn rotate_on_rate_limit(&mut self) -> &CredentialSpec {
        self.cursor = (self.cursor + 1) % self.credentials.len();
        self.current()
    }
}

/// Case-insensitive rate-limit signature matching (§4.5).
const RATE_LIMIT_SIGNATURES: &[&str] =
    &["rate limit", "rate_limit", "429", "too many requests", "rate-limit", "ratelimit"];

/// Non-retryable authentication-failure signatures (§4.5, §7).
const AUTH_FAILURE_SIGNATURES: &[&str] = &["invalid_api_key", "authentication", "permission denied"];

pub fn is_rate_limit_signature(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    RATE_LIMIT_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

pub fn is_authentication_failure_signature(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    AUTH_FAILURE_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
