//! Sliding-window admission control for the AI-backed endpoints.
//!
//! State is process-local and resets on restart. Limits blunt bursts; they
//! are not a cross-instance quota.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

/// Endpoint keys. Each keeps an independent window per user.
pub const CHAT_ENDPOINT: &str = "chat";
pub const WEEKLY_REVIEW_ENDPOINT: &str = "weekly-review";
pub const EMBED_ENDPOINT: &str = "embed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Denied; `retry_after_secs` is when the oldest request leaves the window.
    Denied { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

/// Request timestamps (ms since epoch) per `user:endpoint` key, oldest first.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, VecDeque<i64>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, user_id: &str, endpoint: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.check_at(user_id, endpoint, limit, window, Utc::now().timestamp_millis())
    }

    /// `check` with an explicit clock.
    pub fn check_at(
        &self,
        user_id: &str,
        endpoint: &str,
        limit: u32,
        window: Duration,
        now_ms: i64,
    ) -> RateLimitDecision {
        let window_ms = window.as_millis() as i64;
        let key = format!("{user_id}:{endpoint}");

        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let timestamps = windows.entry(key).or_default();

        while timestamps
            .front()
            .is_some_and(|&oldest| oldest <= now_ms - window_ms)
        {
            timestamps.pop_front();
        }

        if timestamps.len() >= limit as usize {
            let oldest = timestamps.front().copied().unwrap_or(now_ms);
            let wait_ms = (oldest + window_ms - now_ms).max(0);
            let retry_after_secs = ((wait_ms + 999) / 1000).max(1) as u64;
            debug!("Rate limit hit for {user_id} on {endpoint}, retry in {retry_after_secs}s");
            return RateLimitDecision::Denied { retry_after_secs };
        }

        timestamps.push_back(now_ms);
        RateLimitDecision::Allowed
    }

    /// Drops keys with no timestamps inside `window`. Returns how many went.
    pub fn prune_idle(&self, window: Duration) -> usize {
        self.prune_idle_at(window, Utc::now().timestamp_millis())
    }

    fn prune_idle_at(&self, window: Duration, now_ms: i64) -> usize {
        let cutoff = now_ms - window.as_millis() as i64;
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = windows.len();
        windows.retain(|_, ts| ts.back().is_some_and(|&newest| newest > cutoff));
        before - windows.len()
    }
}
