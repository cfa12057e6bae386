//! Per-identity request budgets.
//!
//! Each (category, identity) pair owns a fixed window counter. A window starts
//! with the first request after the previous one lapsed; the counter is read
//! and bumped under the entry's shard lock, so concurrent requests from one
//! identity can never both take the last slot.

use dashmap::DashMap;
use serde::Serialize;
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateCategory {
    Default,
    /// Operations that fan out into many upstream calls.
    Heavy,
}

impl RateCategory {
    pub fn reject_message(self) -> &'static str {
        match self {
            RateCategory::Default => "Too many requests, please try again later.",
            RateCategory::Heavy => "Leaderboard scanning is rate limited. Try again in an hour.",
        }
    }
}

impl fmt::Display for RateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateCategory::Default => write!(f, "default"),
            RateCategory::Heavy => write!(f, "heavy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_requests: u32,
    pub window: Duration,
}

impl Budget {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow { remaining: u32 },
    Reject { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    window_start: Instant,
    count: u32,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    default: Budget,
    heavy: Budget,
    windows: Arc<DashMap<(RateCategory, String), RateWindow>>,
}

impl RateLimiter {
    pub fn new(default: Budget, heavy: Budget) -> Self {
        Self {
            default,
            heavy,
            windows: Arc::new(DashMap::new()),
        }
    }

    pub fn budget(&self, category: RateCategory) -> Budget {
        match category {
            RateCategory::Default => self.default,
            RateCategory::Heavy => self.heavy,
        }
    }

    /// Counts one request from `identity` against `category`.
    pub fn check(&self, identity: &str, category: RateCategory) -> RateDecision {
        let budget = self.budget(category);
        let now = Instant::now();

        let mut window = self
            .windows
            .entry((category, identity.to_string()))
            .or_insert(RateWindow {
                window_start: now,
                count: 0,
            });

        if now.duration_since(window.window_start) >= budget.window {
            window.window_start = now;
            window.count = 0;
        }

        if window.count >= budget.max_requests {
            let retry_after = budget
                .window
                .saturating_sub(now.duration_since(window.window_start));
            warn!(
                "🚦 Rate limit [{}] hit by {} (retry in {}s)",
                category,
                identity,
                retry_after.as_secs()
            );
            return RateDecision::Reject { retry_after };
        }

        window.count += 1;
        RateDecision::Allow {
            remaining: budget.max_requests - window.count,
        }
    }

    /// Drops windows that have lapsed. Purely memory hygiene.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|(category, _), window| {
            now.duration_since(window.window_start) < self.budget(*category).window
        });
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!("🧹 Dropped {} idle rate windows", removed);
        }
        removed
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            Budget::new(100, Duration::from_secs(15 * 60)),
            Budget::new(5, Duration::from_secs(60 * 60)),
        )
    }
}
