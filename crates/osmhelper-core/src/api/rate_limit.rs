//! Per-credential rate-limit tracking.
//!
//! OSM reports its call budget in three response headers. The tracker keeps
//! the latest values seen for each access token so the client can throttle
//! itself and the UI can show how many calls are left. State only ever comes
//! from real headers; a response without them leaves the previous state alone.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderMap;
use serde::Serialize;
use tokio::time::Instant;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Reset values above this are Unix timestamps rather than a countdown.
const EPOCH_THRESHOLD_SECS: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateState {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Seconds until the budget resets, as of `last_updated`.
    pub reset_in_secs: Option<u64>,
    pub last_updated: Instant,
}

impl RateState {
    /// Seconds left until reset, counting down from the last update. Never negative.
    pub fn seconds_until_reset(&self) -> Option<u64> {
        let elapsed = self.last_updated.elapsed().as_secs();
        self.reset_in_secs.map(|reset| reset.saturating_sub(elapsed))
    }
}

/// Read-only view of a token's rate state for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset_in_secs: Option<u64>,
    pub seconds_until_reset: Option<u64>,
}

#[derive(Debug, Default)]
pub struct RateLimitTracker {
    states: Mutex<HashMap<String, RateState>>,
}

fn parse_header(headers: &HeaderMap, name: &str) -> Option<u64> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    let value: f64 = raw.parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value.floor() as u64)
    } else {
        None
    }
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, RateState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record rate headers from a response. Returns whether state changed.
    pub fn update(&self, token: &str, headers: &HeaderMap) -> bool {
        if token.is_empty() {
            return false;
        }

        let limit = parse_header(headers, LIMIT_HEADER);
        let remaining = parse_header(headers, REMAINING_HEADER);
        let reset_in_secs = parse_header(headers, RESET_HEADER).map(|reset| {
            if reset > EPOCH_THRESHOLD_SECS {
                let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
                reset.saturating_sub(now)
            } else {
                reset
            }
        });

        if limit.is_none() && remaining.is_none() && reset_in_secs.is_none() {
            return false;
        }

        self.states().insert(
            token.to_string(),
            RateState {
                limit,
                remaining,
                reset_in_secs,
                last_updated: Instant::now(),
            },
        );
        true
    }

    pub fn state(&self, token: &str) -> Option<RateState> {
        if token.is_empty() {
            return None;
        }
        self.states().get(token).copied()
    }

    pub fn seconds_until_reset(&self, token: &str) -> Option<u64> {
        self.state(token)?.seconds_until_reset()
    }

    pub fn snapshot(&self, token: &str) -> Option<RateLimitSnapshot> {
        let state = self.state(token)?;
        Some(RateLimitSnapshot {
            limit: state.limit,
            remaining: state.remaining,
            reset_in_secs: state.reset_in_secs,
            seconds_until_reset: state.seconds_until_reset(),
        })
    }

    /// How long to pause before the next call, if the known budget is spent.
    ///
    /// Only applies when at most one call remains and a positive reset time is
    /// known; the wait is capped at `max_wait`.
    pub fn preflight_delay(&self, token: &str, max_wait: Duration) -> Option<Duration> {
        if max_wait.is_zero() {
            return None;
        }
        let state = self.state(token)?;
        if state.remaining? > 1 {
            return None;
        }
        match state.seconds_until_reset()? {
            0 => None,
            secs => Some(Duration::from_secs(secs).min(max_wait)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_and_countdown() {
        let tracker = RateLimitTracker::new();
        assert!(tracker.update(
            "tok",
            &headers(&[(LIMIT_HEADER, "1000"), (REMAINING_HEADER, "998"), (RESET_HEADER, "120")]),
        ));

        let state = tracker.state("tok").unwrap();
        assert_eq!(state.limit, Some(1000));
        assert_eq!(state.remaining, Some(998));
        assert_eq!(tracker.seconds_until_reset("tok"), Some(120));

        tokio::time::advance(Duration::from_millis(30_500)).await;
        assert_eq!(tracker.seconds_until_reset("tok"), Some(90));

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(tracker.seconds_until_reset("tok"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_headers_keep_prior_state() {
        let tracker = RateLimitTracker::new();
        tracker.update("tok", &headers(&[(REMAINING_HEADER, "5")]));
        let before = tracker.state("tok").unwrap();

        assert!(!tracker.update("tok", &HeaderMap::new()));
        assert!(!tracker.update("tok", &headers(&[(LIMIT_HEADER, "lots")])));
        assert_eq!(tracker.state("tok"), Some(before));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_are_isolated() {
        let tracker = RateLimitTracker::new();
        tracker.update("a", &headers(&[(REMAINING_HEADER, "1")]));
        assert!(tracker.state("b").is_none());
        assert!(tracker.snapshot("b").is_none());
        assert!(!tracker.update("", &headers(&[(REMAINING_HEADER, "1")])));
        assert!(tracker.state("").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_epoch_reset_is_converted() {
        let tracker = RateLimitTracker::new();
        let reset_at = (Utc::now().timestamp() + 300).to_string();
        tracker.update("tok", &headers(&[(RESET_HEADER, &reset_at)]));

        let secs = tracker.seconds_until_reset("tok").unwrap();
        assert!((298..=300).contains(&secs), "got {secs}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot() {
        let tracker = RateLimitTracker::new();
        tracker.update("tok", &headers(&[(LIMIT_HEADER, "100"), (RESET_HEADER, "60")]));
        tokio::time::advance(Duration::from_secs(10)).await;

        let snapshot = tracker.snapshot("tok").unwrap();
        assert_eq!(
            snapshot,
            RateLimitSnapshot {
                limit: Some(100),
                remaining: None,
                reset_in_secs: Some(60),
                seconds_until_reset: Some(50),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_preflight_delay() {
        let tracker = RateLimitTracker::new();
        let cap = Duration::from_secs(8);

        tracker.update("tok", &headers(&[(REMAINING_HEADER, "10"), (RESET_HEADER, "30")]));
        assert_eq!(tracker.preflight_delay("tok", cap), None);

        tracker.update("tok", &headers(&[(REMAINING_HEADER, "1"), (RESET_HEADER, "3")]));
        assert_eq!(tracker.preflight_delay("tok", cap), Some(Duration::from_secs(3)));

        tracker.update("tok", &headers(&[(REMAINING_HEADER, "0"), (RESET_HEADER, "30")]));
        assert_eq!(tracker.preflight_delay("tok", cap), Some(cap));
        assert_eq!(tracker.preflight_delay("tok", Duration::ZERO), None);

        tracker.update("tok", &headers(&[(REMAINING_HEADER, "0"), (RESET_HEADER, "0")]));
        assert_eq!(tracker.preflight_delay("tok", cap), None);
    }
}
