use thiserror::Error;

/// Errors produced while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable held a value that could not be parsed.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// The environment variable name.
        key: String,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A provider name did not match any known provider.
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    /// The selected provider has no credentials configured.
    #[error("provider '{0}' is selected but has no API key configured")]
    MissingCredentials(String),

    /// `PROVIDER` was unset and no provider had credentials present.
    #[error("no provider configured: set PROVIDER or one of the *_API_KEY variables")]
    NoProviderDetected,

    /// Authentication was enabled without a gateway key to check against.
    #[error("AUTH_ENABLED is set but GATEWAY_API_KEY is empty")]
    MissingGatewayKey,
}
