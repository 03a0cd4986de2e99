//! Retry policy for outbound API calls.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Statuses worth retrying: rate limiting and gateway/availability errors.
const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Total attempts, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Backoff before the first retry; doubles on each further attempt.
const BASE_DELAY_MS: u64 = 300;

/// Upper bound on a computed backoff.
const MAX_BACKOFF_MS: u64 = 2_000;

/// Upper bound on a server-directed `Retry-After` wait.
const MAX_RETRY_AFTER_SECS: u64 = 10;

/// Upper bound on the random jitter added to a computed backoff.
const MAX_JITTER_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retryable_statuses: Vec<u16>,
    pub base_delay: Duration,
    pub max_backoff: Duration,
    pub max_retry_after: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
            max_retry_after: Duration::from_secs(MAX_RETRY_AFTER_SECS),
            max_jitter: Duration::from_millis(MAX_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Whether a failed `attempt` (1-based) may be followed by another.
    pub fn should_retry(&self, status: u16, attempt: u32) -> bool {
        attempt < self.max_attempts && self.is_retryable(status)
    }

    /// Delay before the attempt after `attempt` (1-based).
    ///
    /// A parseable `Retry-After` header wins (capped); otherwise exponential
    /// backoff from `base_delay` plus jitter, capped at `max_backoff`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        if let Some(wait) = retry_after.and_then(parse_retry_after) {
            return wait.min(self.max_retry_after);
        }

        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        (backoff + jitter).min(self.max_backoff)
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Some(wait)
}
