//! Per-provider and per-model cost accounting in fixed point.
//!
//! All arithmetic is integer: prices are stored as cents per million
//! tokens, and costs accumulate in "microcents" (10⁻⁸ USD), where the
//! million factor cancels: `cost_micro = tokens * cents_per_million`.
//! Division into USD happens only at read time, so concurrent recording
//! never loses precision.
//!
//! Totals live in three atomics. The per-provider and per-model breakdowns
//! are maps guarded by one mutex, but the integer fields inside each entry
//! are atomics updated outside the lock: contention exists only on
//! first-seen keys.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::Serialize;

/// Microcents per USD.
const MICRO_PER_USD: f64 = 100_000_000.0;

/// Price entry in cents per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub input_cents_per_million: u64,
    pub output_cents_per_million: u64,
}

/// Applied when no table entry matches the model.
const DEFAULT_PRICING: Pricing = Pricing {
    input_cents_per_million: 100,
    output_cents_per_million: 300,
};

/// Built-in price table, matched by prefix against the lowercased model
/// name. First match wins; order longest-prefix-first within a family.
const PRICING_TABLE: &[(&str, Pricing)] = &[
    ("claude-opus", Pricing { input_cents_per_million: 1_500, output_cents_per_million: 7_500 }),
    ("claude-sonnet", Pricing { input_cents_per_million: 300, output_cents_per_million: 1_500 }),
    ("claude-haiku", Pricing { input_cents_per_million: 80, output_cents_per_million: 400 }),
    ("gpt-4o-mini", Pricing { input_cents_per_million: 15, output_cents_per_million: 60 }),
    ("gpt-4o", Pricing { input_cents_per_million: 250, output_cents_per_million: 1_000 }),
    ("gpt-5", Pricing { input_cents_per_million: 125, output_cents_per_million: 1_000 }),
    ("o1", Pricing { input_cents_per_million: 1_500, output_cents_per_million: 6_000 }),
    ("o3", Pricing { input_cents_per_million: 200, output_cents_per_million: 800 }),
    ("llama", Pricing { input_cents_per_million: 59, output_cents_per_million: 79 }),
    ("mistral-large", Pricing { input_cents_per_million: 200, output_cents_per_million: 600 }),
    ("deepseek", Pricing { input_cents_per_million: 27, output_cents_per_million: 110 }),
    ("grok", Pricing { input_cents_per_million: 300, output_cents_per_million: 1_500 }),
];

#[derive(Debug, Default)]
struct CostEntry {
    input_micro: AtomicU64,
    output_micro: AtomicU64,
    requests: AtomicU64,
}

impl CostEntry {
    fn add(&self, input_micro: u64, output_micro: u64) {
        self.input_micro.fetch_add(input_micro, Ordering::Relaxed);
        self.output_micro.fetch_add(output_micro, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn line(&self) -> CostLine {
        let input_micro = self.input_micro.load(Ordering::Relaxed);
        let output_micro = self.output_micro.load(Ordering::Relaxed);

        CostLine {
            input_usd: input_micro as f64 / MICRO_PER_USD,
            output_usd: output_micro as f64 / MICRO_PER_USD,
            total_usd: (input_micro + output_micro) as f64 / MICRO_PER_USD,
            requests: self.requests.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct CostTables {
    providers: BTreeMap<String, Arc<CostEntry>>,
    models: BTreeMap<String, Arc<CostEntry>>,
    custom_pricing: BTreeMap<String, Pricing>,
}

/// Process-lifetime cost accumulator.
pub(crate) struct CostTracker {
    input_micro: AtomicU64,
    output_micro: AtomicU64,
    requests: AtomicU64,
    tables: Mutex<CostTables>,
}

/// One line of the cost report, in USD.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CostLine {
    pub input_usd: f64,
    pub output_usd: f64,
    pub total_usd: f64,
    pub requests: u64,
}

/// The full cost report served on `GET /costs`.
#[derive(Debug, Serialize)]
pub struct CostReport {
    pub total: CostLine,
    pub providers: BTreeMap<String, CostLine>,
    pub models: BTreeMap<String, CostLine>,
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CostTracker {
    pub(crate) fn new() -> Self {
        Self {
            input_micro: AtomicU64::new(0),
            output_micro: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            tables: Mutex::new(CostTables::default()),
        }
    }

    /// Record one completed request's token usage.
    pub(crate) fn record_usage(&self, provider: &str, model: &str, input_tokens: u64, output_tokens: u64) {
        // Take the lock only for pricing lookup and map-slot allocation;
        // the arithmetic and increments run on atomics outside it.
        let (pricing, provider_entry, model_entry) = {
            let mut tables = lock(&self.tables);

            let pricing = tables
                .custom_pricing
                .get(model)
                .copied()
                .unwrap_or_else(|| table_pricing(model));

            let provider_entry = tables.providers.entry(provider.to_string()).or_default().clone();
            let model_entry = tables.models.entry(model.to_string()).or_default().clone();

            (pricing, provider_entry, model_entry)
        };

        let input_micro = input_tokens * pricing.input_cents_per_million;
        let output_micro = output_tokens * pricing.output_cents_per_million;

        self.input_micro.fetch_add(input_micro, Ordering::Relaxed);
        self.output_micro.fetch_add(output_micro, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);

        provider_entry.add(input_micro, output_micro);
        model_entry.add(input_micro, output_micro);
    }

    /// Override pricing for one model. Guarded by the same mutex as the
    /// breakdown maps.
    pub(crate) fn set_custom_pricing(&self, model: impl Into<String>, pricing: Pricing) {
        lock(&self.tables).custom_pricing.insert(model.into(), pricing);
    }

    /// Build the USD report. Conversion out of fixed point happens here and
    /// only here.
    pub(crate) fn report(&self) -> CostReport {
        let input_micro = self.input_micro.load(Ordering::Relaxed);
        let output_micro = self.output_micro.load(Ordering::Relaxed);

        let tables = lock(&self.tables);

        CostReport {
            total: CostLine {
                input_usd: input_micro as f64 / MICRO_PER_USD,
                output_usd: output_micro as f64 / MICRO_PER_USD,
                total_usd: (input_micro + output_micro) as f64 / MICRO_PER_USD,
                requests: self.requests.load(Ordering::Relaxed),
            },
            providers: tables
                .providers
                .iter()
                .map(|(name, entry)| (name.clone(), entry.line()))
                .collect(),
            models: tables
                .models
                .iter()
                .map(|(name, entry)| (name.clone(), entry.line()))
                .collect(),
        }
    }

    /// Zero the accounting (`POST /costs?action=reset`). Custom pricing
    /// overrides survive.
    pub(crate) fn reset(&self) {
        let mut tables = lock(&self.tables);

        self.input_micro.store(0, Ordering::Relaxed);
        self.output_micro.store(0, Ordering::Relaxed);
        self.requests.store(0, Ordering::Relaxed);

        tables.providers.clear();
        tables.models.clear();
    }
}

fn table_pricing(model: &str) -> Pricing {
    let lowered = model.to_ascii_lowercase();

    PRICING_TABLE
        .iter()
        .find(|(prefix, _)| lowered.starts_with(prefix))
        .map(|(_, pricing)| *pricing)
        .unwrap_or(DEFAULT_PRICING)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
