//! Response cache: bounded capacity, uniform TTL, keyed by a canonical
//! request digest.
//!
//! Only deterministic, non-streaming requests participate: `stream: true`
//! or a non-zero temperature bypasses both the probe and the store. Cached
//! values are fully materialized source-dialect responses, so a hit skips
//! the upstream entirely.

use std::{
    fmt::Write as _,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use config::CacheConfig;
use mini_moka::sync::Cache;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::messages::anthropic::{MessagesRequest, MessagesResponse};

/// Hit/miss/size counters exposed on the metrics surface.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: u64,
}

/// The response cache. Disabled configuration yields a sentinel that always
/// misses and drops stores.
pub(crate) struct ResponseCache {
    entries: Option<Cache<String, Arc<MessagesResponse>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub(crate) fn new(config: &CacheConfig) -> Self {
        let entries = config.enabled.then(|| {
            Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.ttl)
                .build()
        });

        Self {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Whether a request may be served from or stored into the cache.
    pub(crate) fn eligible(request: &MessagesRequest) -> bool {
        let streaming = request.stream.unwrap_or(false);
        let deterministic = request.temperature.unwrap_or(0.0) <= 0.0;

        !streaming && deterministic
    }

    /// Stable digest over the canonical request tuple. Any difference in
    /// `(model, system, messages, tools, tool_choice, max_tokens)` produces
    /// a different key.
    pub(crate) fn key(request: &MessagesRequest) -> String {
        let canonical = serde_json::json!([
            request.model,
            request.system,
            request.messages,
            request.tools,
            request.tool_choice,
            request.max_tokens,
        ]);

        let serialized = serde_json::to_vec(&canonical).unwrap_or_default();
        let digest = Sha256::digest(&serialized);

        let mut key = String::with_capacity(64);
        for byte in digest {
            let _ = write!(key, "{byte:02x}");
        }
        key
    }

    /// Look up a fresh entry, counting the outcome.
    pub(crate) fn get(&self, key: &str) -> Option<Arc<MessagesResponse>> {
        let entries = self.entries.as_ref()?;

        match entries.get(&key.to_string()) {
            Some(response) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(response)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or refresh an entry.
    pub(crate) fn put(&self, key: String, response: Arc<MessagesResponse>) {
        if let Some(entries) = &self.entries {
            entries.insert(key, response);
        }
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.as_ref().map(|entries| entries.entry_count()).unwrap_or(0),
        }
    }
}
