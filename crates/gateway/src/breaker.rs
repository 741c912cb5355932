//! Circuit breaker isolating the upstream from failure storms.
//!
//! Three states: `closed` (everything passes, failures count), `open`
//! (everything is rejected until the timeout elapses), `half_open` (probes
//! pass; enough successes close the circuit, any failure reopens it).
//! Transitions are single-writer under compare-and-swap on the state word;
//! the counters are plain atomics, so admission never takes a lock.

use std::{
    sync::atomic::{AtomicU32, AtomicU64, Ordering},
    time::{Duration, Instant},
};

use config::BreakerConfig;
use serde::Serialize;

const CLOSED: u32 = 0;
const OPEN: u32 = 1;
const HALF_OPEN: u32 = 2;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// The circuit breaker. Disabled configuration yields a sentinel that
/// always admits and never trips.
pub(crate) struct CircuitBreaker {
    enabled: bool,
    failure_threshold: u32,
    recovery_threshold: u32,
    open_timeout: Duration,
    state: AtomicU32,
    failures: AtomicU32,
    successes: AtomicU32,
    /// Millis since `epoch` at which the circuit last opened.
    opened_at_ms: AtomicU64,
    epoch: Instant,
}

impl CircuitBreaker {
    pub(crate) fn new(config: &BreakerConfig) -> Self {
        Self {
            enabled: config.enabled,
            failure_threshold: config.failure_threshold.max(1),
            recovery_threshold: config.recovery_threshold.max(1),
            open_timeout: config.open_timeout,
            state: AtomicU32::new(CLOSED),
            failures: AtomicU32::new(0),
            successes: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// Admission check. Never admits while `open`; the first caller after
    /// the timeout wins the CAS into `half_open` and becomes the probe.
    pub(crate) fn try_acquire(&self) -> bool {
        if !self.enabled {
            return true;
        }

        match self.state.load(Ordering::Acquire) {
            CLOSED | HALF_OPEN => true,
            _ => {
                let opened_at = Duration::from_millis(self.opened_at_ms.load(Ordering::Acquire));
                if self.epoch.elapsed() < opened_at + self.open_timeout {
                    return false;
                }

                if self
                    .state
                    .compare_exchange(OPEN, HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.successes.store(0, Ordering::Release);
                    return true;
                }

                // Lost the race; admit only if the winner moved us to
                // half-open rather than back to open.
                self.state.load(Ordering::Acquire) == HALF_OPEN
            }
        }
    }

    pub(crate) fn record_success(&self) {
        if !self.enabled {
            return;
        }

        match self.state.load(Ordering::Acquire) {
            CLOSED => {
                self.failures.store(0, Ordering::Release);
            }
            HALF_OPEN => {
                let successes = self.successes.fetch_add(1, Ordering::AcqRel) + 1;

                if successes >= self.recovery_threshold
                    && self
                        .state
                        .compare_exchange(HALF_OPEN, CLOSED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    self.failures.store(0, Ordering::Release);
                    log::info!("circuit breaker closed after {successes} successful probes");
                }
            }
            _ => {}
        }
    }

    pub(crate) fn record_failure(&self) {
        if !self.enabled {
            return;
        }

        match self.state.load(Ordering::Acquire) {
            CLOSED => {
                let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;

                if failures >= self.failure_threshold
                    && self
                        .state
                        .compare_exchange(CLOSED, OPEN, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    self.mark_opened();
                    log::warn!("circuit breaker opened after {failures} consecutive failures");
                }
            }
            HALF_OPEN => {
                // Any failure during probing reopens immediately.
                if self
                    .state
                    .compare_exchange(HALF_OPEN, OPEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.mark_opened();
                    log::warn!("circuit breaker reopened by a failed probe");
                }
            }
            _ => {}
        }
    }

    pub(crate) fn state(&self) -> BreakerState {
        if !self.enabled {
            return BreakerState::Closed;
        }

        match self.state.load(Ordering::Acquire) {
            OPEN => BreakerState::Open,
            HALF_OPEN => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    fn mark_opened(&self) {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        self.opened_at_ms.store(now_ms, Ordering::Release);
    }
}
