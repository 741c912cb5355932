//! Rate limiting middleware for the primary API path.
//!
//! Only `/v1/messages` is gated; health, metrics, model listing, and the
//! root endpoint are exempt. Rejections carry `Retry-After` with the
//! bucket's projected refill time.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, response::IntoResponse};
use gateway::GatewayError;
use http::{Request, Response};
use rate_limit::RateLimitManager;
use tower::Layer;

/// The only path the token bucket applies to.
const GATED_PATH: &str = "/v1/messages";

#[derive(Clone)]
pub struct RateLimitLayer {
    manager: Arc<RateLimitManager>,
}

impl RateLimitLayer {
    pub fn new(manager: Arc<RateLimitManager>) -> Self {
        Self { manager }
    }
}

impl<Service> Layer<Service> for RateLimitLayer
where
    Service: Send + Clone,
{
    type Service = RateLimitService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        RateLimitService {
            next,
            manager: self.manager.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<Service> {
    next: Service,
    manager: Arc<RateLimitManager>,
}

impl<Service> tower::Service<Request<Body>> for RateLimitService<Service>
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

        if req.uri().path() != GATED_PATH {
            return Box::pin(next.call(req));
        }

        match self.manager.try_acquire() {
            Ok(()) => Box::pin(next.call(req)),
            Err(e) => {
                let retry_after = e.retry_after();
                log::debug!("rate limiter rejected request, retry in {retry_after:?}");

                Box::pin(async move { Ok(GatewayError::RateLimited { retry_after }.into_response()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use config::RateLimitConfig;
    use http::StatusCode;
    use tower::ServiceExt;

    fn app(requests: u32, burst: u32) -> Router {
        let manager = RateLimitManager::new(&RateLimitConfig {
            enabled: true,
            requests_per_window: requests,
            window_seconds: 60,
            burst,
        });

        Router::new()
            .route("/v1/messages", get(|| async { "ok" }))
            .route("/health", get(|| async { "ok" }))
            .layer(RateLimitLayer::new(Arc::new(manager)))
    }

    #[tokio::test]
    async fn empty_bucket_rejects_with_retry_after() {
        let app = app(1, 0);

        let ok = app
            .clone()
            .oneshot(Request::get("/v1/messages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let rejected = app
            .oneshot(Request::get("/v1/messages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(rejected.headers().contains_key(http::header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn health_is_exempt() {
        let app = app(1, 0);

        // Exhaust the bucket on the gated path.
        let _ = app
            .clone()
            .oneshot(Request::get("/v1/messages").body(Body::empty()).unwrap())
            .await
            .unwrap();

        for _ in 0..10 {
            let response = app
                .clone()
                .oneshot(Request::get("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
