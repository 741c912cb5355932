//! Token-bucket rate limiting for the gateway's primary API path.
//!
//! One process-wide bucket: the sustained rate is `requests_per_window`
//! tokens per window, the capacity is `burst + 1` so a short spike after a
//! quiet period is absorbed. Built on [`governor`]'s direct (unkeyed)
//! limiter, which gives lock-free acquisition and a projected wait time on
//! rejection.

use std::{num::NonZeroU32, time::Duration};

use config::RateLimitConfig;
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use thiserror::Error;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Rate limiting errors.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The bucket is empty; retry after the contained duration.
    #[error("rate limit exceeded, retry in {0:?}")]
    Exceeded(Duration),
}

impl RateLimitError {
    /// The projected wait before a token becomes available.
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimitError::Exceeded(wait) => *wait,
        }
    }
}

/// Process-wide token bucket gating the primary API path.
///
/// A disabled manager is a sentinel that admits everything, so the pipeline
/// never branches on whether rate limiting is configured.
pub struct RateLimitManager {
    limiter: Option<DirectLimiter>,
    clock: DefaultClock,
}

impl RateLimitManager {
    /// Build the manager from configuration. A config with `enabled: false`
    /// yields the pass-through sentinel.
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            log::debug!("rate limiting disabled, all requests admitted");
            return Self {
                limiter: None,
                clock: DefaultClock::default(),
            };
        }

        let requests = config.requests_per_window.max(1);
        let window = Duration::from_secs(config.window_seconds.max(1));

        // Refill interval: one token every window/requests.
        let period = window / requests;
        let capacity = NonZeroU32::new(config.burst.saturating_add(1)).unwrap_or(NonZeroU32::MIN);

        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(capacity);

        log::debug!(
            "rate limiter: {requests} requests per {window:?}, capacity {capacity} (burst {})",
            config.burst
        );

        Self {
            limiter: Some(RateLimiter::direct(quota)),
            clock: DefaultClock::default(),
        }
    }

    /// Atomically debit one token, or report how long until one is
    /// available.
    pub fn try_acquire(&self) -> Result<(), RateLimitError> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        limiter
            .check()
            .map_err(|not_until| RateLimitError::Exceeded(not_until.wait_time_from(self.clock.now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(requests: u32, window_seconds: u64, burst: u32) -> RateLimitManager {
        RateLimitManager::new(&RateLimitConfig {
            enabled: true,
            requests_per_window: requests,
            window_seconds,
            burst,
        })
    }

    #[test]
    fn disabled_manager_admits_everything() {
        let manager = RateLimitManager::new(&RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });

        for _ in 0..10_000 {
            manager.try_acquire().unwrap();
        }
    }

    #[test]
    fn full_bucket_admits_exactly_capacity() {
        // 1 request per 60s window, burst 4: capacity is 5 and refill is far
        // too slow to matter inside this test.
        let manager = manager(1, 60, 4);

        for _ in 0..5 {
            manager.try_acquire().unwrap();
        }

        let err = manager.try_acquire().unwrap_err();
        assert!(err.retry_after() > Duration::ZERO);
    }

    #[test]
    fn rejection_reports_projected_wait() {
        let manager = manager(1, 60, 0);

        manager.try_acquire().unwrap();
        let err = manager.try_acquire().unwrap_err();

        // One token per minute: the wait must be under a minute and well
        // above zero.
        let wait = err.retry_after();
        assert!(wait <= Duration::from_secs(60));
        assert!(wait >= Duration::from_secs(50));
    }

    #[test]
    fn bucket_refills_over_time() {
        // 100 requests per second so refill is observable without a long
        // sleep.
        let manager = manager(100, 1, 0);

        manager.try_acquire().unwrap();
        assert!(manager.try_acquire().is_err());

        std::thread::sleep(Duration::from_millis(30));
        manager.try_acquire().unwrap();
    }
}
