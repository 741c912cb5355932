//! Switchyard configuration structures, loaded from the process environment.
//!
//! The gateway consumes configuration as a single immutable [`Config`]
//! snapshot taken at startup. All keys live in one flat environment
//! namespace (`PROVIDER`, `OPENAI_API_KEY`, `SONNET_MODEL`, ...); nothing is
//! re-read after [`Config::from_env`] returns.

#![deny(missing_docs)]

mod env;
mod error;
mod features;
mod provider;
mod tier;

use std::{collections::BTreeMap, time::Duration};

pub use error::ConfigError;
pub use features::{AuthConfig, BreakerConfig, CacheConfig, QueueConfig, RateLimitConfig};
pub use provider::{ProviderConfig, ProviderKind};
pub use tier::{FallbackTarget, Tier, TierRoute};

/// Main configuration snapshot for the gateway process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP listener binds to.
    pub port: u16,
    /// Log filter string passed to the logger (e.g. `info` or `gateway=debug`).
    pub log_filter: String,
    /// The default upstream provider for requests that match no tier route.
    pub provider: ProviderKind,
    /// Per-provider credentials and endpoint overrides, for every provider
    /// that has any configuration present.
    pub providers: BTreeMap<ProviderKind, ProviderConfig>,
    /// Whether tier routing is active (`MULTI_PROVIDER`).
    pub tier_routing: bool,
    /// Tier-specific provider bindings.
    pub tiers: BTreeMap<Tier, TierRoute>,
    /// Global fallback target, attempted once when the primary fails.
    pub fallback: Option<FallbackTarget>,
    /// Default target model per tier (`MODEL_OPUS` and friends).
    pub tier_models: BTreeMap<Tier, String>,
    /// Model aliases, resolved by case-insensitive exact match.
    pub model_aliases: Vec<(String, String)>,
    /// Request rate limiting.
    pub rate_limit: RateLimitConfig,
    /// Response caching.
    pub cache: CacheConfig,
    /// Inbound API-key authentication.
    pub auth: AuthConfig,
    /// Admission queue.
    pub queue: QueueConfig,
    /// Circuit breaker.
    pub breaker: BreakerConfig,
    /// Process-wide upstream HTTP timeout.
    pub upstream_timeout: Duration,
    /// Model-name prefixes that select the "responses" envelope on
    /// dual-envelope providers.
    pub responses_model_prefixes: Vec<String>,
}

impl Config {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        env::load()
    }

    /// Configuration for one provider, if any of its keys were set.
    pub fn provider_config(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.get(&kind)
    }

    /// Resolve a model alias. Matching is a case-insensitive exact
    /// comparison against the alias table; unmatched names pass through.
    pub fn resolve_alias<'a>(&'a self, model: &'a str) -> &'a str {
        self.model_aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(model))
            .map(|(_, target)| target.as_str())
            .unwrap_or(model)
    }
}
