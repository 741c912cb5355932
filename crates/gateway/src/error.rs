use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::messages::anthropic::ErrorBody;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway errors, each mapping to an HTTP status and a source-dialect
/// error kind. Error responses are always JSON in the standard envelope,
/// even when the failed request asked for streaming.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad method, unparsable body, or missing required field.
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing or wrong gateway credential.
    #[error("{0}")]
    Authentication(String),

    /// The token bucket rejected the request.
    #[error("rate limit exceeded, retry in {retry_after:?}")]
    RateLimited {
        /// Projected wait until a token is available.
        retry_after: Duration,
    },

    /// The circuit breaker is open.
    #[error("upstream circuit breaker is open")]
    CircuitOpen,

    /// The admission queue refused the request.
    #[error("{0}")]
    Overloaded(String),

    /// Upstream connect failure, exhausted retries, or a failed fallback.
    #[error("{0}")]
    Api(String),

    /// Internal marshaling or translation failure.
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// The HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::CircuitOpen | Self::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Api(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The source-dialect error kind string.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Authentication(_) => "authentication_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::CircuitOpen | Self::Overloaded(_) => "overloaded_error",
            Self::Api(_) | Self::Internal(_) => "api_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody::new(self.error_type(), self.to_string());

        let mut response = (status, Json(body)).into_response();

        match &self {
            GatewayError::RateLimited { retry_after } => {
                let seconds = retry_after.as_secs().max(1);
                if let Ok(value) = seconds.to_string().parse() {
                    response.headers_mut().insert(http::header::RETRY_AFTER, value);
                }
            }
            GatewayError::CircuitOpen => {
                response
                    .headers_mut()
                    .insert("x-circuit-breaker", http::HeaderValue::from_static("open"));
            }
            _ => {}
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(
            GatewayError::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Authentication("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::RateLimited {
                retry_after: Duration::from_secs(3)
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(GatewayError::CircuitOpen.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(GatewayError::Api("x".into()).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn rate_limit_response_carries_retry_after() {
        let response = GatewayError::RateLimited {
            retry_after: Duration::from_millis(2500),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(http::header::RETRY_AFTER).unwrap(), "2");
    }

    #[test]
    fn circuit_open_response_carries_marker_header() {
        let response = GatewayError::CircuitOpen.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get("x-circuit-breaker").unwrap(), "open");
    }
}
