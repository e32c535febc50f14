//! Request-rate limiting shared across all workers
//!
//! The RateLimiter hands out dispatch slots spaced evenly at `1 / rate`
//! seconds using a lock-free reservation counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Global request-rate limiter shared across all concurrent batch tasks
///
/// # Algorithm
///
/// - Each dispatch reserves the next free slot on a monotonic timeline
/// - Slots are `ceil(1s / rate)` apart, so any half-open one-second window
///   contains at most `rate` slots
/// - A slot in the past is moved up to "now"; idle time is never banked
/// - `acquire` sleeps until its slot is reached
///
/// # Implementation
///
/// Uses AtomicU64 for lock-free reservation:
/// - `rate`: Requests per second (always at least 1)
/// - `next_slot`: Earliest free slot (nanoseconds since `epoch`)
///
/// Time is read through [`tokio::time::Instant`], so a paused test runtime
/// drives the limiter deterministically.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    /// Requests per second
    rate: Arc<AtomicU64>,
    /// Earliest free slot (nanoseconds since epoch)
    next_slot: Arc<AtomicU64>,
    epoch: Instant,
}

impl RateLimiter {
    /// Create a new RateLimiter admitting `rate_per_second` dispatches per second
    ///
    /// A rate of zero is treated as one; configuration validation rejects zero
    /// before a limiter is built.
    ///
    /// # Examples
    ///
    /// ```
    /// use kegg_dl::rate_limiter::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(3);
    /// assert_eq!(limiter.get_rate(), 3);
    /// ```
    #[must_use]
    pub fn new(rate_per_second: u32) -> Self {
        Self {
            rate: Arc::new(AtomicU64::new(u64::from(rate_per_second.max(1)))),
            next_slot: Arc::new(AtomicU64::new(0)),
            epoch: Instant::now(),
        }
    }

    /// Set a new rate
    ///
    /// Takes effect for slots reserved after the call. Slots already handed
    /// out keep their spacing.
    pub fn set_rate(&self, rate_per_second: u32) {
        self.rate
            .store(u64::from(rate_per_second.max(1)), Ordering::SeqCst);
    }

    /// Get the current rate in requests per second
    pub fn get_rate(&self) -> u32 {
        u32::try_from(self.rate.load(Ordering::Relaxed)).unwrap_or(u32::MAX)
    }

    /// Spacing between consecutive slots
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_nanos())
    }

    /// Wait until the caller may dispatch one request
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kegg_dl::rate_limiter::RateLimiter;
    ///
    /// # async fn example() {
    /// let limiter = RateLimiter::new(3);
    ///
    /// // Before every request
    /// limiter.acquire().await;
    /// // ... send request ...
    /// # }
    /// ```
    pub async fn acquire(&self) {
        let slot = self.reserve();
        let deadline = self.epoch + Duration::from_nanos(slot);
        if deadline > Instant::now() {
            tokio::time::sleep_until(deadline).await;
        }
    }

    /// Reserve the next slot and return it (nanoseconds since epoch)
    fn reserve(&self) -> u64 {
        let interval = self.interval_nanos();
        let now = self.now_nanos();
        let previous = self
            .next_slot
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                Some(next.max(now).saturating_add(interval))
            })
            // The closure always returns Some
            .unwrap_or_else(|current| current);
        previous.max(now)
    }

    fn interval_nanos(&self) -> u64 {
        let rate = self.rate.load(Ordering::Relaxed).max(1);
        NANOS_PER_SECOND.div_ceil(rate)
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}
