// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff with jitter for transient VCS-host failures (§4.4).

use rand::Rng;
use std::time::Duration;

/// Retry `f` up to `max_attempts` times, sleeping `min(cap, base *
/// 2^(attempt-1))` plus up to 20% jitter between attempts. `is_retryable`
/// decides whether a given error should be retried at all — 4xx
/// client errors are not.
pub async fn with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    base: Duration,
    cap: Duration,
    is_retryable: impl Fn(&E) -> bool,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && is_retryable(&err) => {
                let delay = backoff_delay(attempt, base, cap);
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exp = base.saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16));
    let bounded = exp.min(cap);
    let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..0.2);
    bounded + Duration::from_secs_f64(bounded.as_secs_f64() * jitter_frac)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
