//! Process-lifetime request metrics.
//!
//! Every field is an atomic updated with `fetch_add`, so counters are
//! monotonically non-decreasing for the life of the process and readers
//! never block writers. Derived figures (average latency, throughput,
//! success rate) are computed on the read side only.

use std::{
    fmt::Write as _,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::{breaker::BreakerState, cache::CacheStats};

pub(crate) struct Metrics {
    started: Instant,
    started_at_unix: i64,
    total: AtomicU64,
    success: AtomicU64,
    error: AtomicU64,
    streaming: AtomicU64,
    tool_use: AtomicU64,
    latency_micros: AtomicU64,
    fallback_attempts: AtomicU64,
    fallback_successes: AtomicU64,
}

/// Point-in-time metrics view with derived figures.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub started_at_unix: i64,
    pub requests: RequestCounts,
    pub latency: LatencyFigures,
    pub throughput_rps: f64,
    pub success_rate: f64,
    pub fallback: FallbackCounts,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequestCounts {
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub streaming: u64,
    pub tool_use: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencyFigures {
    pub total_ms: u64,
    pub average_ms: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FallbackCounts {
    pub attempts: u64,
    pub successes: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at_unix: jiff::Timestamp::now().as_second(),
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            error: AtomicU64::new(0),
            streaming: AtomicU64::new(0),
            tool_use: AtomicU64::new(0),
            latency_micros: AtomicU64::new(0),
            fallback_attempts: AtomicU64::new(0),
            fallback_successes: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_success(&self, latency: Duration, streaming: bool, tool_use: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.success.fetch_add(1, Ordering::Relaxed);
        self.latency_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);

        if streaming {
            self.streaming.fetch_add(1, Ordering::Relaxed);
        }
        if tool_use {
            self.tool_use.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_error(&self, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.error.fetch_add(1, Ordering::Relaxed);
        self.latency_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback_attempt(&self) {
        self.fallback_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback_success(&self) {
        self.fallback_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn request_counts(&self) -> (u64, u64) {
        (self.total.load(Ordering::Relaxed), self.error.load(Ordering::Relaxed))
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let success = self.success.load(Ordering::Relaxed);
        let latency_micros = self.latency_micros.load(Ordering::Relaxed);
        let uptime = self.started.elapsed();

        MetricsSnapshot {
            uptime_seconds: uptime.as_secs(),
            started_at_unix: self.started_at_unix,
            requests: RequestCounts {
                total,
                success,
                error: self.error.load(Ordering::Relaxed),
                streaming: self.streaming.load(Ordering::Relaxed),
                tool_use: self.tool_use.load(Ordering::Relaxed),
            },
            latency: LatencyFigures {
                total_ms: latency_micros / 1_000,
                average_ms: if total > 0 {
                    latency_micros as f64 / 1_000.0 / total as f64
                } else {
                    0.0
                },
            },
            throughput_rps: if uptime.as_secs_f64() > 0.0 {
                total as f64 / uptime.as_secs_f64()
            } else {
                0.0
            },
            success_rate: if total > 0 { success as f64 / total as f64 } else { 1.0 },
            fallback: FallbackCounts {
                attempts: self.fallback_attempts.load(Ordering::Relaxed),
                successes: self.fallback_successes.load(Ordering::Relaxed),
            },
        }
    }

    /// Flat key/value rendering in the Prometheus exposition format.
    pub(crate) fn to_prometheus(&self, cache: &CacheStats, breaker: BreakerState) -> String {
        let snapshot = self.snapshot();
        let mut out = String::with_capacity(1024);

        let mut counter = |name: &str, help: &str, value: u64| {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        };

        counter(
            "switchyard_requests_total",
            "Total requests handled",
            snapshot.requests.total,
        );
        counter(
            "switchyard_requests_success_total",
            "Requests completed successfully",
            snapshot.requests.success,
        );
        counter(
            "switchyard_requests_error_total",
            "Requests that ended in an error",
            snapshot.requests.error,
        );
        counter(
            "switchyard_requests_streaming_total",
            "Requests served as event streams",
            snapshot.requests.streaming,
        );
        counter(
            "switchyard_requests_tool_use_total",
            "Requests whose response invoked tools",
            snapshot.requests.tool_use,
        );
        counter(
            "switchyard_latency_ms_total",
            "Summed request latency in milliseconds",
            snapshot.latency.total_ms,
        );
        counter(
            "switchyard_fallback_attempts_total",
            "Fallback dispatch attempts",
            snapshot.fallback.attempts,
        );
        counter(
            "switchyard_fallback_successes_total",
            "Fallback dispatches that served the response",
            snapshot.fallback.successes,
        );
        counter("switchyard_cache_hits_total", "Response cache hits", cache.hits);
        counter("switchyard_cache_misses_total", "Response cache misses", cache.misses);

        let _ = writeln!(out, "# HELP switchyard_cache_entries Current response cache size");
        let _ = writeln!(out, "# TYPE switchyard_cache_entries gauge");
        let _ = writeln!(out, "switchyard_cache_entries {}", cache.size);

        let _ = writeln!(out, "# HELP switchyard_uptime_seconds Seconds since process start");
        let _ = writeln!(out, "# TYPE switchyard_uptime_seconds gauge");
        let _ = writeln!(out, "switchyard_uptime_seconds {}", snapshot.uptime_seconds);

        let breaker_open = match breaker {
            BreakerState::Open => 1,
            BreakerState::Closed | BreakerState::HalfOpen => 0,
        };
        let _ = writeln!(out, "# HELP switchyard_circuit_open Whether the circuit breaker is open");
        let _ = writeln!(out, "# TYPE switchyard_circuit_open gauge");
        let _ = writeln!(out, "switchyard_circuit_open {breaker_open}");

        out
    }
}
