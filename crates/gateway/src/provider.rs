//! Provider adapters: per-target endpoint layout, auth scheme, and model
//! rewriting.
//!
//! Adapters are pure value objects, immutable after construction. They hold
//! a base URL, an optional embedded credential (tier routing gives each tier
//! its own key), and for parameterized targets a deployment name and API
//! version. They never perform I/O except the standalone model-discovery
//! helper. Anything request-scoped (the effective model above all) is
//! passed in as an argument rather than stored, so one adapter instance can
//! serve concurrent requests.

use std::borrow::Cow;

use anyhow::Context;
use config::{ProviderConfig, ProviderKind};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::messages::anthropic::ModelInfo;

/// Anthropic API version header value for passthrough dispatch.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Which wire shape a dispatch uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WireShape {
    /// Chat-completions family.
    Chat,
    /// The "responses" envelope.
    Responses,
    /// The source dialect itself; no translation.
    Messages,
}

/// A configured upstream target.
#[derive(Debug, Clone)]
pub(crate) struct Adapter {
    kind: ProviderKind,
    base_url: String,
    api_key: Option<SecretString>,
    deployment: Option<String>,
    api_version: Option<String>,
    responses_prefixes: Vec<String>,
}

impl Adapter {
    /// Build an adapter from provider configuration, falling back to the
    /// provider's well-known base URL.
    pub(crate) fn new(kind: ProviderKind, config: Option<&ProviderConfig>, responses_prefixes: &[String]) -> Self {
        let base_url = config
            .and_then(|c| c.base_url.clone())
            .unwrap_or_else(|| default_base_url(kind).to_string());

        Self {
            kind,
            // Constructors normalize: trailing slashes never survive.
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.and_then(|c| c.api_key.clone()),
            deployment: config.and_then(|c| c.deployment.clone()),
            api_version: config.and_then(|c| c.api_version.clone()),
            responses_prefixes: responses_prefixes.to_vec(),
        }
    }

    /// Override the credential and base URL, for tier-scoped bindings.
    pub(crate) fn with_overrides(mut self, api_key: Option<SecretString>, base_url: Option<String>) -> Self {
        if let Some(key) = api_key {
            self.api_key = Some(key);
        }
        if let Some(url) = base_url {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        self
    }

    pub(crate) fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub(crate) fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Whether dispatch must translate the source dialect.
    pub(crate) fn requires_translation(&self) -> bool {
        self.kind != ProviderKind::Anthropic
    }

    pub(crate) fn supports_streaming(&self) -> bool {
        true
    }

    /// Whether image blocks can be forwarded in the target's image shape.
    pub(crate) fn supports_images(&self) -> bool {
        self.kind != ProviderKind::Deepseek
    }

    /// The wire shape serving `model` on this target.
    ///
    /// Dual-envelope targets route reasoning-class models (matched by
    /// configured name prefixes) through the responses envelope.
    pub(crate) fn wire_shape(&self, model: &str) -> WireShape {
        match self.kind {
            ProviderKind::Anthropic => WireShape::Messages,
            ProviderKind::Openai | ProviderKind::Azure => {
                let lowered = model.to_ascii_lowercase();
                if self.responses_prefixes.iter().any(|prefix| lowered.starts_with(prefix)) {
                    WireShape::Responses
                } else {
                    WireShape::Chat
                }
            }
            _ => WireShape::Chat,
        }
    }

    /// The dispatch URL for `model`.
    pub(crate) fn endpoint_url(&self, model: &str) -> String {
        let base = &self.base_url;

        match self.kind {
            ProviderKind::Anthropic => format!("{base}/v1/messages"),
            ProviderKind::Azure => {
                let api_version = self.api_version.as_deref().unwrap_or("2024-10-21");

                match self.wire_shape(model) {
                    WireShape::Responses => format!("{base}/openai/v1/responses?api-version=preview"),
                    _ => {
                        let deployment = self.deployment.as_deref().unwrap_or(model);
                        format!("{base}/openai/deployments/{deployment}/chat/completions?api-version={api_version}")
                    }
                }
            }
            ProviderKind::Openai => match self.wire_shape(model) {
                WireShape::Responses => format!("{base}/responses"),
                _ => format!("{base}/chat/completions"),
            },
            _ => format!("{base}/chat/completions"),
        }
    }

    /// Apply this target's auth scheme. The adapter's embedded credential
    /// wins over the caller-supplied default key.
    pub(crate) fn apply_auth(&self, builder: RequestBuilder, default_key: Option<&SecretString>) -> RequestBuilder {
        let key = self.api_key.as_ref().or(default_key);

        match self.kind {
            ProviderKind::Anthropic => {
                let builder = builder.header("anthropic-version", ANTHROPIC_VERSION);
                match key {
                    Some(key) => builder.header("x-api-key", key.expose_secret()),
                    None => builder,
                }
            }
            ProviderKind::Azure => match key {
                Some(key) => builder.header("api-key", key.expose_secret()),
                None => builder,
            },
            ProviderKind::Ollama => builder,
            _ => match key {
                Some(key) => builder.bearer_auth(key.expose_secret()),
                None => builder,
            },
        }
    }

    /// Rewrite the effective model for target-specific namespaces. Azure
    /// addresses deployments, not models.
    pub(crate) fn rewrite_model<'a>(&self, requested: &'a str) -> Cow<'a, str> {
        match (&self.kind, &self.deployment) {
            (ProviderKind::Azure, Some(deployment)) => Cow::Owned(deployment.clone()),
            _ => Cow::Borrowed(requested),
        }
    }

    /// Standalone model-discovery helper, outside the request pipeline.
    pub(crate) async fn list_models(&self, client: &Client) -> anyhow::Result<Vec<ModelInfo>> {
        #[derive(Deserialize)]
        struct Listing {
            data: Vec<ListedModel>,
        }

        #[derive(Deserialize)]
        struct ListedModel {
            id: String,
            #[serde(default)]
            display_name: Option<String>,
            #[serde(default)]
            created: Option<u64>,
            #[serde(default)]
            created_at: Option<u64>,
        }

        let url = match self.kind {
            ProviderKind::Anthropic => format!("{}/v1/models", self.base_url),
            ProviderKind::Azure => {
                // Deployment listing needs management-plane credentials;
                // report the configured deployment instead.
                return Ok(self
                    .deployment
                    .iter()
                    .map(|deployment| ModelInfo {
                        id: deployment.clone(),
                        kind: "model".to_string(),
                        display_name: deployment.clone(),
                        created_at: 0,
                    })
                    .collect());
            }
            _ => format!("{}/models", self.base_url),
        };

        let response = self
            .apply_auth(client.get(&url), None)
            .send()
            .await
            .with_context(|| format!("failed to request models from {}", self.name()))?;

        if !response.status().is_success() {
            anyhow::bail!("model listing for {} failed with status {}", self.name(), response.status());
        }

        let listing: Listing = response
            .json()
            .await
            .with_context(|| format!("failed to parse model listing from {}", self.name()))?;

        Ok(listing
            .data
            .into_iter()
            .map(|model| ModelInfo {
                display_name: model.display_name.unwrap_or_else(|| model.id.clone()),
                id: model.id,
                kind: "model".to_string(),
                created_at: model.created.or(model.created_at).unwrap_or(0),
            })
            .collect())
    }
}

fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Openai => "https://api.openai.com/v1",
        ProviderKind::Anthropic => "https://api.anthropic.com",
        ProviderKind::Azure => "https://example.openai.azure.com",
        ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        ProviderKind::Mistral => "https://api.mistral.ai/v1",
        ProviderKind::Groq => "https://api.groq.com/openai/v1",
        ProviderKind::Deepseek => "https://api.deepseek.com/v1",
        ProviderKind::Xai => "https://api.x.ai/v1",
        ProviderKind::Openrouter => "https://openrouter.ai/api/v1",
        ProviderKind::Ollama => "http://localhost:11434/v1",
    }
}
