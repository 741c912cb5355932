//! Environment loader for the flat configuration key space.

use std::{collections::BTreeMap, env, str::FromStr, time::Duration};

use secrecy::SecretString;

use crate::{
    AuthConfig, BreakerConfig, CacheConfig, Config, ConfigError, FallbackTarget, ProviderConfig, ProviderKind,
    QueueConfig, RateLimitConfig, Tier, TierRoute,
};

const DEFAULT_PORT: u16 = 8082;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 300;
const DEFAULT_RESPONSES_PREFIXES: &str = "o1,o3,o4,gpt-5";

pub(crate) fn load() -> Result<Config, ConfigError> {
    let providers = load_providers();
    let provider = select_provider(&providers)?;

    let tier_routing = bool_var("MULTI_PROVIDER")?.unwrap_or(false);

    let mut tiers = BTreeMap::new();
    for tier in Tier::ALL {
        if let Some(route) = load_tier_route(tier)? {
            tiers.insert(tier, route);
        }
    }

    let fallback = load_fallback_target("FALLBACK")?;

    let mut tier_models = BTreeMap::new();
    for tier in Tier::ALL {
        if let Some(model) = var(&format!("MODEL_{}", tier.env_prefix())) {
            tier_models.insert(tier, model);
        }
    }

    let auth = AuthConfig {
        enabled: bool_var("AUTH_ENABLED")?.unwrap_or(false),
        api_key: var("GATEWAY_API_KEY").map(SecretString::from),
        anonymous_metrics: bool_var("AUTH_ANONYMOUS_METRICS")?.unwrap_or(false),
    };

    if auth.enabled && auth.api_key.is_none() {
        return Err(ConfigError::MissingGatewayKey);
    }

    Ok(Config {
        port: parsed_var("PORT")?.unwrap_or(DEFAULT_PORT),
        log_filter: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        provider,
        providers,
        tier_routing,
        tiers,
        fallback,
        tier_models,
        model_aliases: load_aliases()?,
        rate_limit: load_rate_limit()?,
        cache: load_cache()?,
        auth,
        queue: load_queue()?,
        breaker: load_breaker()?,
        upstream_timeout: Duration::from_secs(
            parsed_var("UPSTREAM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        ),
        responses_model_prefixes: var("RESPONSES_MODEL_PREFIXES")
            .unwrap_or_else(|| DEFAULT_RESPONSES_PREFIXES.to_string())
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
    })
}

fn load_providers() -> BTreeMap<ProviderKind, ProviderConfig> {
    let mut providers = BTreeMap::new();

    for kind in ProviderKind::ALL {
        let prefix = kind.env_prefix();

        let entry = ProviderConfig {
            api_key: var(&format!("{prefix}_API_KEY")).map(SecretString::from),
            base_url: var(&format!("{prefix}_BASE_URL")).map(normalize_base_url),
            deployment: var(&format!("{prefix}_DEPLOYMENT")),
            api_version: var(&format!("{prefix}_API_VERSION")),
        };

        if entry.is_configured() {
            providers.insert(kind, entry);
        }
    }

    providers
}

/// Pick the active provider: an explicit `PROVIDER` wins, otherwise the
/// first provider (in a fixed order) whose credentials are present.
fn select_provider(providers: &BTreeMap<ProviderKind, ProviderConfig>) -> Result<ProviderKind, ConfigError> {
    if let Some(name) = var("PROVIDER") {
        let kind: ProviderKind = name.parse()?;

        let has_key = providers.get(&kind).and_then(|p| p.api_key.as_ref()).is_some();
        if kind.requires_api_key() && !has_key {
            return Err(ConfigError::MissingCredentials(kind.as_str().to_string()));
        }

        return Ok(kind);
    }

    for kind in ProviderKind::ALL {
        let Some(entry) = providers.get(&kind) else {
            continue;
        };

        if entry.api_key.is_some() || !kind.requires_api_key() {
            log::info!("no PROVIDER set, detected credentials for '{kind}'");
            return Ok(kind);
        }
    }

    Err(ConfigError::NoProviderDetected)
}

fn load_tier_route(tier: Tier) -> Result<Option<TierRoute>, ConfigError> {
    let prefix = tier.env_prefix();

    let Some(provider_name) = var(&format!("{prefix}_PROVIDER")) else {
        return Ok(None);
    };

    Ok(Some(TierRoute {
        provider: provider_name.parse()?,
        model: var(&format!("{prefix}_MODEL")),
        api_key: var(&format!("{prefix}_API_KEY")).map(SecretString::from),
        base_url: var(&format!("{prefix}_BASE_URL")).map(normalize_base_url),
        fallback: load_fallback_target(&format!("{prefix}_FALLBACK"))?,
    }))
}

fn load_fallback_target(prefix: &str) -> Result<Option<FallbackTarget>, ConfigError> {
    let Some(provider_name) = var(&format!("{prefix}_PROVIDER")) else {
        return Ok(None);
    };

    Ok(Some(FallbackTarget {
        provider: provider_name.parse()?,
        model: var(&format!("{prefix}_MODEL")),
        api_key: var(&format!("{prefix}_API_KEY")).map(SecretString::from),
        base_url: var(&format!("{prefix}_BASE_URL")).map(normalize_base_url),
    }))
}

/// Parse `MODEL_ALIASES=alias:model,alias:model`.
fn load_aliases() -> Result<Vec<(String, String)>, ConfigError> {
    let Some(raw) = var("MODEL_ALIASES") else {
        return Ok(Vec::new());
    };

    let mut aliases = Vec::new();

    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let Some((alias, model)) = pair.split_once(':') else {
            return Err(ConfigError::InvalidValue {
                key: "MODEL_ALIASES".to_string(),
                value: raw.clone(),
                reason: format!("entry '{pair}' is not of the form alias:model"),
            });
        };

        aliases.push((alias.trim().to_string(), model.trim().to_string()));
    }

    Ok(aliases)
}

fn load_rate_limit() -> Result<RateLimitConfig, ConfigError> {
    let defaults = RateLimitConfig::default();

    Ok(RateLimitConfig {
        enabled: bool_var("RATE_LIMIT_ENABLED")?.unwrap_or(defaults.enabled),
        requests_per_window: parsed_var("RATE_LIMIT_REQUESTS")?.unwrap_or(defaults.requests_per_window),
        window_seconds: parsed_var("RATE_LIMIT_WINDOW_SECS")?.unwrap_or(defaults.window_seconds),
        burst: parsed_var("RATE_LIMIT_BURST")?.unwrap_or(defaults.burst),
    })
}

fn load_cache() -> Result<CacheConfig, ConfigError> {
    let defaults = CacheConfig::default();

    Ok(CacheConfig {
        enabled: bool_var("CACHE_ENABLED")?.unwrap_or(defaults.enabled),
        max_entries: parsed_var("CACHE_MAX_ENTRIES")?.unwrap_or(defaults.max_entries),
        ttl: parsed_var("CACHE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.ttl),
    })
}

fn load_queue() -> Result<QueueConfig, ConfigError> {
    let defaults = QueueConfig::default();

    Ok(QueueConfig {
        enabled: bool_var("QUEUE_ENABLED")?.unwrap_or(defaults.enabled),
        max_size: parsed_var("QUEUE_MAX_SIZE")?.unwrap_or(defaults.max_size),
        max_wait: parsed_var("QUEUE_MAX_WAIT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.max_wait),
        retry_delay: parsed_var("QUEUE_RETRY_DELAY_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_delay),
        max_retries: parsed_var("QUEUE_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
    })
}

fn load_breaker() -> Result<BreakerConfig, ConfigError> {
    let defaults = BreakerConfig::default();

    Ok(BreakerConfig {
        enabled: bool_var("CIRCUIT_BREAKER_ENABLED")?.unwrap_or(defaults.enabled),
        failure_threshold: parsed_var("CIRCUIT_BREAKER_THRESHOLD")?.unwrap_or(defaults.failure_threshold),
        open_timeout: parsed_var("CIRCUIT_BREAKER_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.open_timeout),
        recovery_threshold: parsed_var("CIRCUIT_BREAKER_RECOVERY")?.unwrap_or(defaults.recovery_threshold),
    })
}

/// Read a variable, treating unset and blank identically.
fn var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
        }
        Err(_) => None,
    }
}

fn bool_var(key: &str) -> Result<Option<bool>, ConfigError> {
    let Some(value) = var(key) else {
        return Ok(None);
    };

    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            reason: "expected a boolean (1/0, true/false, yes/no, on/off)".to_string(),
        }),
    }
}

fn parsed_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = var(key) else {
        return Ok(None);
    };

    match value.parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            reason: e.to_string(),
        }),
    }
}

/// Trailing slashes are always trimmed so URL assembly can join with `/`.
fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
