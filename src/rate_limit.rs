//! In-process fixed-window rate limiter.
//!
//! The limiter is an owned component carried in `AppState`; every request
//! handler that needs it borrows the same instance. Counters live behind a
//! `Mutex` because requests are served from a multi-threaded runtime.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use metrics::counter;
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::ApiError;
use crate::session::system_clock_ms;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    reset_at_ms: i64,
}

/// Outcome of a single [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// End of the current window, milliseconds since the Unix epoch.
    pub reset: i64,
}

impl RateLimitDecision {
    /// Seconds until the window resets, rounded up and never zero.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let remaining_ms = (self.reset - now_ms).max(0) as u64;
        remaining_ms.div_ceil(1000).max(1)
    }

    /// Writes the `X-RateLimit-*` headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(self.remaining));
        headers.insert(RATE_LIMIT_RESET_HEADER, HeaderValue::from(self.reset));
    }

    /// 429 problem+json response for a rejected request.
    pub fn to_error(&self, now_ms: i64) -> ApiError {
        counter!("rate_limited_total").increment(1);
        ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "Rate limit exceeded",
        )
        .with_retry_after(self.retry_after_secs(now_ms))
        .with_details(serde_json::json!({
            "limit": self.limit,
            "remaining": self.remaining,
            "reset": self.reset,
        }))
        .with_header(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(self.limit))
        .with_header(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(self.remaining))
        .with_header(RATE_LIMIT_RESET_HEADER, HeaderValue::from(self.reset))
    }
}

/// Fixed-window counters keyed by client identifier.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn check(&self, identifier: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.check_at(identifier, limit, window, system_clock_ms())
    }

    /// [`RateLimiter::check`] against an explicit clock.
    pub fn check_at(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
        now_ms: i64,
    ) -> RateLimitDecision {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let mut entries = self.lock();

        match entries.get_mut(identifier) {
            Some(entry) if now_ms < entry.reset_at_ms => {
                if entry.count >= limit {
                    return RateLimitDecision {
                        success: false,
                        limit,
                        remaining: 0,
                        reset: entry.reset_at_ms,
                    };
                }
                entry.count += 1;
                RateLimitDecision {
                    success: true,
                    limit,
                    remaining: limit - entry.count,
                    reset: entry.reset_at_ms,
                }
            }
            _ => {
                let reset_at_ms = now_ms.saturating_add(window_ms);
                entries.insert(
                    identifier.to_string(),
                    Entry {
                        count: 1,
                        reset_at_ms,
                    },
                );
                RateLimitDecision {
                    success: limit > 0,
                    limit,
                    remaining: limit.saturating_sub(1),
                    reset: reset_at_ms,
                }
            }
        }
    }

    /// Drops entries whose window has ended. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(system_clock_ms())
    }

    pub fn sweep_expired_at(&self, now_ms: i64) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.reset_at_ms > now_ms);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Periodically sweep expired entries until `shutdown` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_sweeper(interval, shutdown).await })
    }

    #[instrument(skip_all)]
    async fn run_sweeper(&self, interval: Duration, shutdown: CancellationToken) {
        info!(interval_seconds = interval.as_secs(), "Starting rate limit sweeper");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(interval) => {
                    let removed = self.sweep_expired();
                    if removed > 0 {
                        debug!(removed, "Swept expired rate limit entries");
                    }
                }
            }
        }
        info!("Rate limit sweeper stopped");
    }
}

/// Derive the limiter key from the caller's forwarded address, scoped to a
/// project when one is known.
pub fn client_identifier(headers: &HeaderMap, project_id: Option<&str>) -> String {
    let address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
        .unwrap_or("unknown");

    match project_id {
        Some(project_id) => format!("{address}:{project_id}"),
        None => address.to_string(),
    }
}
