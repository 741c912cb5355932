//! API-key authentication middleware.
//!
//! When enabled, requests must present the configured gateway key via
//! `x-api-key` or `Authorization: Bearer`. Keys are compared in constant
//! time by hashing both sides and comparing digests, so neither length nor
//! prefix leaks through timing. `/` and `/health` are always anonymous;
//! `/metrics*` anonymity is configurable.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, response::IntoResponse};
use config::AuthConfig;
use gateway::GatewayError;
use http::{Request, Response};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use tower::Layer;

/// Paths that never require credentials.
const ANONYMOUS_PATHS: &[&str] = &["/", "/health"];

#[derive(Clone)]
pub struct AuthLayer {
    state: Option<Arc<AuthState>>,
}

struct AuthState {
    key_digest: [u8; 32],
    anonymous_metrics: bool,
}

impl AuthLayer {
    pub fn new(config: &AuthConfig) -> Self {
        let state = if config.enabled {
            config.api_key.as_ref().map(|key| {
                Arc::new(AuthState {
                    key_digest: Sha256::digest(key.expose_secret().as_bytes()).into(),
                    anonymous_metrics: config.anonymous_metrics,
                })
            })
        } else {
            None
        };

        Self { state }
    }
}

impl<Service> Layer<Service> for AuthLayer
where
    Service: Send + Clone,
{
    type Service = AuthService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AuthService {
            next,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<Service> {
    next: Service,
    state: Option<Arc<AuthState>>,
}

impl<Service> tower::Service<Request<Body>> for AuthService<Service>
where
    Service: tower::Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut next = self.next.clone();

        let Some(state) = self.state.clone() else {
            return Box::pin(next.call(req));
        };

        if state.exempt(req.uri().path()) {
            return Box::pin(next.call(req));
        }

        let authorized = presented_key(&req).is_some_and(|key| state.matches(&key));

        Box::pin(async move {
            if authorized {
                next.call(req).await
            } else {
                log::debug!("rejecting request without a valid gateway key");
                Ok(GatewayError::Authentication("missing or invalid API key".to_string()).into_response())
            }
        })
    }
}

impl AuthState {
    fn exempt(&self, path: &str) -> bool {
        if ANONYMOUS_PATHS.contains(&path) {
            return true;
        }

        self.anonymous_metrics && path.starts_with("/metrics")
    }

    fn matches(&self, presented: &str) -> bool {
        let digest: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        constant_time_eq(&digest, &self.key_digest)
    }
}

/// Extract the presented key from `x-api-key` or a bearer authorization.
fn presented_key(req: &Request<Body>) -> Option<String> {
    if let Some(key) = req.headers().get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key.trim().to_string());
    }

    req.headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|key| key.trim().to_string())
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
