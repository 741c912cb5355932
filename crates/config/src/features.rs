//! Feature toggles and their knobs.
//!
//! Every optional pipeline component carries an `enabled` flag; a disabled
//! component is still constructed, as a sentinel that admits everything.

use std::time::Duration;

use secrecy::SecretString;

/// Token-bucket rate limiting on the primary API path.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether the limiter gates requests at all.
    pub enabled: bool,
    /// Sustained allowance per window.
    pub requests_per_window: u32,
    /// Window length in seconds.
    pub window_seconds: u64,
    /// Extra capacity absorbed after a quiet period.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_window: 60,
            window_seconds: 60,
            burst: 10,
        }
    }
}

/// Response cache sizing and freshness.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether cache probes and stores happen.
    pub enabled: bool,
    /// Maximum number of cached responses.
    pub max_entries: u64,
    /// Uniform time-to-live for entries.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: 1000,
            ttl: Duration::from_secs(300),
        }
    }
}

/// Inbound API-key authentication.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Whether requests must present the gateway key.
    pub enabled: bool,
    /// The shared key clients must present.
    pub api_key: Option<SecretString>,
    /// Allow `/metrics*` without credentials.
    pub anonymous_metrics: bool,
}

/// Bounded admission queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Whether admission goes through the queue.
    pub enabled: bool,
    /// Maximum queued requests before immediate rejection.
    pub max_size: usize,
    /// Queued items older than this are dropped with a timeout error.
    pub max_wait: Duration,
    /// Delay between queue retry attempts.
    pub retry_delay: Duration,
    /// Maximum queue retry attempts.
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: 100,
            max_wait: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            max_retries: 3,
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Whether the breaker gates dispatch.
    pub enabled: bool,
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is admitted.
    pub open_timeout: Duration,
    /// Successes in half-open required to close again.
    pub recovery_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            recovery_threshold: 2,
        }
    }
}
