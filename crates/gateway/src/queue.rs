//! Bounded FIFO admission queue.
//!
//! When enabled, every request enqueues a ticket and waits for the
//! dispatcher to admit it in arrival order. The queue rejects immediately
//! when full (the caller retries with `retry_delay` up to `max_retries`),
//! drops tickets older than `max_wait` with a timeout error, and has a
//! pause/resume gate the pipeline toggles while the circuit is open, so
//! queued work is held back during a declared outage instead of being fed
//! into a failing upstream.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use config::QueueConfig;
use thiserror::Error;
use tokio::sync::{Notify, oneshot};
use tokio_util::sync::CancellationToken;

/// Queue admission errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum QueueError {
    #[error("request queue is full")]
    Full,

    #[error("request queue is closed")]
    Closed,

    #[error("request timed out waiting in queue")]
    TimedOut,
}

struct Ticket {
    enqueued_at: Instant,
    admit: oneshot::Sender<Result<(), QueueError>>,
}

struct QueueInner {
    tickets: Mutex<VecDeque<Ticket>>,
    notify: Notify,
    max_size: usize,
    max_wait: Duration,
    closed: AtomicBool,
    paused: AtomicBool,
}

impl QueueInner {
    fn enqueue(&self) -> Result<oneshot::Receiver<Result<(), QueueError>>, QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        let (tx, rx) = oneshot::channel();

        {
            let mut tickets = lock(&self.tickets);
            if tickets.len() >= self.max_size {
                return Err(QueueError::Full);
            }

            tickets.push_back(Ticket {
                enqueued_at: Instant::now(),
                admit: tx,
            });
        }

        self.notify.notify_one();
        Ok(rx)
    }

    /// Pop the next live ticket, waiting for work, resume, or close.
    /// Tickets that outlived `max_wait` are failed and skipped.
    async fn dequeue(&self, cancel: &CancellationToken) -> Option<oneshot::Sender<Result<(), QueueError>>> {
        loop {
            if !self.paused.load(Ordering::Acquire) {
                let mut tickets = lock(&self.tickets);

                while let Some(ticket) = tickets.pop_front() {
                    if ticket.enqueued_at.elapsed() > self.max_wait {
                        let _ = ticket.admit.send(Err(QueueError::TimedOut));
                        continue;
                    }

                    return Some(ticket.admit);
                }

                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            } else if self.closed.load(Ordering::Acquire) {
                return None;
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);

        let drained: Vec<Ticket> = lock(&self.tickets).drain(..).collect();
        for ticket in drained {
            let _ = ticket.admit.send(Err(QueueError::Closed));
        }

        self.notify.notify_one();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The admission queue handle. Disabled configuration yields a sentinel
/// that admits immediately.
pub(crate) struct RequestQueue {
    inner: Option<Arc<QueueInner>>,
    retry_delay: Duration,
    max_retries: u32,
}

impl RequestQueue {
    /// Build the queue and, when enabled, spawn its dispatcher task. The
    /// dispatcher releases tickets in FIFO order and exits when `shutdown`
    /// cancels or the queue closes.
    pub(crate) fn new(config: &QueueConfig, shutdown: CancellationToken) -> Self {
        if !config.enabled {
            return Self {
                inner: None,
                retry_delay: config.retry_delay,
                max_retries: config.max_retries,
            };
        }

        let inner = Arc::new(QueueInner {
            tickets: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            max_size: config.max_size.max(1),
            max_wait: config.max_wait,
            closed: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        });

        let dispatcher = inner.clone();
        tokio::spawn(async move {
            while let Some(admit) = dispatcher.dequeue(&shutdown).await {
                let _ = admit.send(Ok(()));
            }
            log::debug!("queue dispatcher stopped");
        });

        Self {
            inner: Some(inner),
            retry_delay: config.retry_delay,
            max_retries: config.max_retries,
        }
    }

    /// Wait for admission. Retries a full queue up to `max_retries` times
    /// with `retry_delay` between attempts; cancellation wins immediately.
    pub(crate) async fn admit(&self, cancel: &CancellationToken) -> Result<(), QueueError> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };

        let mut attempt = 0;

        let rx = loop {
            match inner.enqueue() {
                Ok(rx) => break rx,
                Err(QueueError::Full) if attempt < self.max_retries => {
                    attempt += 1;
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => {}
                        _ = cancel.cancelled() => return Err(QueueError::Closed),
                    }
                }
                Err(e) => return Err(e),
            }
        };

        tokio::select! {
            result = rx => result.unwrap_or(Err(QueueError::Closed)),
            _ = cancel.cancelled() => Err(QueueError::Closed),
        }
    }

    /// Hold queued work back (declared outage).
    pub(crate) fn pause(&self) {
        if let Some(inner) = &self.inner
            && !inner.paused.swap(true, Ordering::AcqRel)
        {
            log::info!("request queue paused");
        }
    }

    /// Resume admissions.
    pub(crate) fn resume(&self) {
        if let Some(inner) = &self.inner
            && inner.paused.swap(false, Ordering::AcqRel)
        {
            log::info!("request queue resumed");
            inner.notify.notify_one();
        }
    }

    /// Close the queue, failing every pending ticket.
    pub(crate) fn close(&self) {
        if let Some(inner) = &self.inner {
            inner.close();
        }
    }

    /// Pending ticket count, for the status surface.
    pub(crate) fn depth(&self) -> usize {
        self.inner.as_ref().map(|inner| lock(&inner.tickets).len()).unwrap_or(0)
    }
}
