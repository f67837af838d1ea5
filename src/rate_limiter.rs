//! C2 — dual-window token bucket rate limiter. Lazy refill, fractional
//! token accounting, cooperative waiting. See spec §4.2.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::trace;

use crate::config::RateLimitConfig;
use crate::error::RateLimitError;
use crate::status::QuotaStatus;
use crate::status::WindowStatus;

const MINUTE_MS: f64 = 60_000.0;
const DAY_MS: f64 = 86_400_000.0;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate_per_ms: f64,
    last_refill: i64,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate_per_ms: f64, now: i64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate_per_ms,
            last_refill: now,
        }
    }

    /// Computes elapsed time since the last refill and tops up `tokens`,
    /// clamped at `capacity`. Must run before any read or mutation.
    fn refill(&mut self, now: i64) {
        let elapsed = (now - self.last_refill).max(0) as f64;
        self.tokens = (self.tokens + elapsed * self.refill_rate_per_ms).min(self.capacity);
        self.last_refill = now;
    }

    fn can_consume(&self) -> bool {
        self.tokens >= 1.0
    }

    fn consume(&mut self) {
        self.tokens = (self.tokens - 1.0).max(0.0);
    }

    fn retry_after_ms(&self) -> u64 {
        if self.tokens >= 1.0 {
            return 0;
        }
        let needed = 1.0 - self.tokens;
        (needed / self.refill_rate_per_ms).ceil() as u64
    }

    fn used(&self) -> u64 {
        (self.capacity - self.tokens).floor().max(0.0) as u64
    }

    fn reset(&mut self, now: i64) {
        self.tokens = self.capacity;
        self.last_refill = now;
    }
}

struct Buckets {
    minute: TokenBucket,
    day: TokenBucket,
}

/// Two independent token buckets guarded by one mutex, matching the
/// teacher's single-lock-per-subsystem discipline (spec §5).
pub struct RateLimiter {
    enabled: bool,
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let now = Utc::now().timestamp_millis();
        let per_minute = config.per_minute.max(1) as f64;
        let per_day = config.per_day.max(1) as f64;
        Self {
            enabled: config.enabled,
            buckets: Mutex::new(Buckets {
                minute: TokenBucket::new(per_minute, per_minute / MINUTE_MS, now),
                day: TokenBucket::new(per_day, per_day / DAY_MS, now),
            }),
        }
    }

    pub async fn can_consume(&self) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Utc::now().timestamp_millis();
        let mut guard = self.buckets.lock().await;
        guard.minute.refill(now);
        guard.day.refill(now);
        guard.minute.can_consume() && guard.day.can_consume()
    }

    /// Consumes one token from each bucket. Call only after a successful
    /// subprocess exit — a failed run must never consume quota (spec §4.2).
    pub async fn consume(&self) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }
        let now = Utc::now().timestamp_millis();
        let mut guard = self.buckets.lock().await;
        guard.minute.refill(now);
        guard.day.refill(now);

        if guard.minute.can_consume() && guard.day.can_consume() {
            guard.minute.consume();
            guard.day.consume();
            return Ok(());
        }

        // Minute bucket takes precedence when both are short.
        let retry_ms = if !guard.minute.can_consume() {
            guard.minute.retry_after_ms()
        } else {
            guard.day.retry_after_ms()
        };
        let quota = quota_status_locked(&guard, now);
        drop(guard);
        Err(RateLimitError {
            retry_after: Duration::from_millis(retry_ms),
            quota,
        })
    }

    /// Cooperative loop: sleeps until quota is available, then returns.
    /// Never errors.
    #[tracing::instrument(skip(self))]
    pub async fn wait_for_quota(&self) {
        if !self.enabled {
            return;
        }
        loop {
            let now = Utc::now().timestamp_millis();
            let retry_ms = {
                let mut guard = self.buckets.lock().await;
                guard.minute.refill(now);
                guard.day.refill(now);
                if guard.minute.can_consume() && guard.day.can_consume() {
                    0
                } else if !guard.minute.can_consume() {
                    guard.minute.retry_after_ms()
                } else {
                    guard.day.retry_after_ms()
                }
            };
            if retry_ms == 0 {
                return;
            }
            let sleep_ms = retry_ms.min(60_000);
            trace!(sleep_ms, "rate limiter waiting for quota");
            sleep(Duration::from_millis(sleep_ms)).await;
        }
    }

    pub async fn get_quota_status(&self) -> QuotaStatus {
        let now = Utc::now().timestamp_millis();
        let mut guard = self.buckets.lock().await;
        guard.minute.refill(now);
        guard.day.refill(now);
        quota_status_locked(&guard, now)
    }

    /// Alias for [`Self::get_quota_status`], for symmetry with the
    /// introspection helpers the teacher exposes around its capability cache.
    pub async fn snapshot(&self) -> QuotaStatus {
        self.get_quota_status().await
    }

    pub async fn reset(&self) {
        let now = Utc::now().timestamp_millis();
        let mut guard = self.buckets.lock().await;
        guard.minute.reset(now);
        guard.day.reset(now);
    }
}

fn quota_status_locked(buckets: &Buckets, now: i64) -> QuotaStatus {
    let next_midnight_utc = {
        let today = chrono::DateTime::<Utc>::from_timestamp_millis(now)
            .unwrap_or_else(Utc::now)
            .date_naive();
        let next_day = today.succ_opt().unwrap_or(today);
        next_day
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    };

    QuotaStatus {
        per_minute: WindowStatus {
            used: buckets.minute.used(),
            limit: buckets.minute.capacity as u64,
            reset_at: buckets.minute.last_refill + 60_000,
        },
        per_day: WindowStatus {
            used: buckets.day.used(),
            limit: buckets.day.capacity as u64,
            reset_at: next_midnight_utc,
        },
    }
}
