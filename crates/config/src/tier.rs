use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::ProviderKind;

/// Capability tier inferred from the requested model name.
///
/// The client tool names models after the source vendor's families; the
/// family token embedded in the name ("opus", "sonnet", "haiku") decides the
/// tier, which in turn may route to a dedicated provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Largest models ("opus").
    High,
    /// Mid-range models ("sonnet").
    Mid,
    /// Smallest models ("haiku").
    Low,
}

impl Tier {
    /// All tiers, high to low.
    pub const ALL: [Tier; 3] = [Tier::High, Tier::Mid, Tier::Low];

    /// Infer the tier from a requested model name.
    ///
    /// Matching is a substring check against the lowercased name. A name
    /// carrying none of the family tokens has no tier and uses the default
    /// provider.
    pub fn detect(model: &str) -> Option<Tier> {
        let lowered = model.to_ascii_lowercase();

        if lowered.contains("opus") {
            Some(Tier::High)
        } else if lowered.contains("sonnet") {
            Some(Tier::Mid)
        } else if lowered.contains("haiku") {
            Some(Tier::Low)
        } else {
            None
        }
    }

    /// Canonical lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Mid => "mid",
            Tier::Low => "low",
        }
    }

    /// Prefix for this tier's environment variables
    /// (`OPUS_PROVIDER`, `SONNET_MODEL`, `HAIKU_FALLBACK_PROVIDER`, ...).
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Tier::High => "OPUS",
            Tier::Mid => "SONNET",
            Tier::Low => "HAIKU",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tier's dedicated provider binding.
#[derive(Debug, Clone)]
pub struct TierRoute {
    /// Provider serving this tier.
    pub provider: ProviderKind,
    /// Target model on that provider. Absent means the default mapping
    /// (`MODEL_<TIER>`) or the requested name applies.
    pub model: Option<String>,
    /// Tier-scoped credential. Overrides the provider-level key.
    pub api_key: Option<SecretString>,
    /// Tier-scoped base URL override. Normalized: no trailing slash.
    pub base_url: Option<String>,
    /// Tier-local fallback, attempted before the global one.
    pub fallback: Option<FallbackTarget>,
}

/// A secondary provider attempted once when the primary dispatch fails.
#[derive(Debug, Clone)]
pub struct FallbackTarget {
    /// Fallback provider.
    pub provider: ProviderKind,
    /// Model to request from the fallback. Absent keeps the primary's
    /// effective model.
    pub model: Option<String>,
    /// Credential for the fallback provider.
    pub api_key: Option<SecretString>,
    /// Base URL override for the fallback provider.
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_tier_from_family_token() {
        assert_eq!(Tier::detect("claude-opus-4-20250514"), Some(Tier::High));
        assert_eq!(Tier::detect("claude-sonnet-4-20250514"), Some(Tier::Mid));
        assert_eq!(Tier::detect("claude-haiku-4-5"), Some(Tier::Low));
    }

    #[test]
    fn detection_ignores_case() {
        assert_eq!(Tier::detect("Claude-SONNET-4"), Some(Tier::Mid));
    }

    #[test]
    fn unfamiliar_names_have_no_tier() {
        assert_eq!(Tier::detect("gpt-4o"), None);
        assert_eq!(Tier::detect(""), None);
    }

    #[test]
    fn token_anywhere_in_the_name_matches() {
        // Substring matching is deliberate: custom deployments embed the
        // family token in arbitrary positions.
        assert_eq!(Tier::detect("my-sonnet-finetune"), Some(Tier::Mid));
    }
}
