use std::{fmt, str::FromStr};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// The upstream providers the gateway can dispatch to.
///
/// Every variant except [`ProviderKind::Anthropic`] speaks a dialect that
/// requires translation; Anthropic is the native passthrough target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI platform (chat and responses envelopes).
    Openai,
    /// Anthropic, the source dialect itself. Passthrough.
    Anthropic,
    /// Azure OpenAI deployments (chat and responses envelopes).
    Azure,
    /// Google Gemini via its OpenAI-compatible endpoint.
    Google,
    /// Mistral platform.
    Mistral,
    /// Groq cloud.
    Groq,
    /// DeepSeek platform.
    Deepseek,
    /// xAI platform.
    Xai,
    /// OpenRouter aggregator.
    Openrouter,
    /// Local Ollama instance. Keyless.
    Ollama,
}

impl ProviderKind {
    /// All providers, in credential auto-detection order.
    pub const ALL: [ProviderKind; 10] = [
        ProviderKind::Openai,
        ProviderKind::Anthropic,
        ProviderKind::Azure,
        ProviderKind::Google,
        ProviderKind::Mistral,
        ProviderKind::Groq,
        ProviderKind::Deepseek,
        ProviderKind::Xai,
        ProviderKind::Openrouter,
        ProviderKind::Ollama,
    ];

    /// Canonical lowercase name, as used in `PROVIDER` and in metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Azure => "azure",
            ProviderKind::Google => "google",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Groq => "groq",
            ProviderKind::Deepseek => "deepseek",
            ProviderKind::Xai => "xai",
            ProviderKind::Openrouter => "openrouter",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Prefix for this provider's environment variables
    /// (`OPENAI_API_KEY`, `AZURE_OPENAI_BASE_URL`, ...).
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "OPENAI",
            ProviderKind::Anthropic => "ANTHROPIC",
            ProviderKind::Azure => "AZURE_OPENAI",
            ProviderKind::Google => "GOOGLE",
            ProviderKind::Mistral => "MISTRAL",
            ProviderKind::Groq => "GROQ",
            ProviderKind::Deepseek => "DEEPSEEK",
            ProviderKind::Xai => "XAI",
            ProviderKind::Openrouter => "OPENROUTER",
            ProviderKind::Ollama => "OLLAMA",
        }
    }

    /// Whether this provider needs an API key before it can be selected.
    /// Ollama listens on localhost without credentials.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();

        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownProvider(s.to_string()))
    }
}

/// Static configuration for a single provider.
///
/// Everything here is optional: a provider entry exists as soon as any of
/// its environment variables is set, and the gateway's adapter layer fills
/// in defaults (base URL, auth scheme) per provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// API key, absent for keyless providers.
    pub api_key: Option<SecretString>,
    /// Base URL override. Normalized: no trailing slash.
    pub base_url: Option<String>,
    /// Azure deployment name. Ignored by other providers.
    pub deployment: Option<String>,
    /// Azure API version. Ignored by other providers.
    pub api_version: Option<String>,
}

impl ProviderConfig {
    /// Whether this entry carries anything at all.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.base_url.is_some() || self.deployment.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::Openai);
        assert_eq!(" deepseek ".parse::<ProviderKind>().unwrap(), ProviderKind::Deepseek);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = "hal9000".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown provider 'hal9000'");
    }

    #[test]
    fn only_ollama_is_keyless() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.requires_api_key(), kind != ProviderKind::Ollama);
        }
    }
}
