//! The gateway core: dialect translation and the request pipeline.
//!
//! The crate exposes an axum [`Router`] serving the source-dialect surface
//! (`POST /v1/messages` plus the operational endpoints) backed by a shared
//! [`Pipeline`]. Authentication and rate limiting are middleware concerns
//! layered on by the server crate.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

mod breaker;
mod cache;
mod cost;
mod error;
mod http_client;
pub mod messages;
mod metrics;
mod pipeline;
mod provider;
mod queue;
mod status;
mod streaming;
mod translate;

pub use breaker::BreakerState;
pub use cache::CacheStats;
pub use cost::{CostLine, CostReport, Pricing};
pub use error::{GatewayError, Result};
pub use metrics::{FallbackCounts, LatencyFigures, MetricsSnapshot, RequestCounts};
pub use pipeline::Pipeline;
pub use status::{FleetEntry, StatusDocument, read_fleet};

/// Build the gateway router over a shared pipeline.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/v1/messages", post(messages))
        .route("/v1/models", get(models))
        .route("/health", get(health))
        .route("/metrics", get(metrics_json))
        .route("/metrics/prometheus", get(metrics_prometheus))
        .route("/costs", get(costs).post(costs_action))
        .route("/", get(root))
        .with_state(pipeline)
}

/// The chat endpoint of the source dialect.
async fn messages(State(pipeline): State<Arc<Pipeline>>, body: Bytes) -> Response {
    pipeline.handle_messages(body).await
}

/// Source-dialect model listing, aggregated across configured providers.
async fn models(State(pipeline): State<Arc<Pipeline>>) -> Response {
    Json(pipeline.list_models().await).into_response()
}

async fn health(State(pipeline): State<Arc<Pipeline>>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "provider": pipeline.provider_name(),
        "circuit_breaker": pipeline.breaker_state(),
    }))
    .into_response()
}

/// Structured JSON metrics tree.
async fn metrics_json(State(pipeline): State<Arc<Pipeline>>) -> Response {
    Json(serde_json::json!({
        "metrics": pipeline.metrics_snapshot(),
        "cache": pipeline.cache_stats(),
        "circuit_breaker": pipeline.breaker_state(),
        "queue_depth": pipeline.queue_depth(),
    }))
    .into_response()
}

/// Flat text metrics in the Prometheus exposition format.
async fn metrics_prometheus(State(pipeline): State<Arc<Pipeline>>) -> Response {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        pipeline.prometheus_text(),
    )
        .into_response()
}

async fn costs(State(pipeline): State<Arc<Pipeline>>) -> Response {
    Json(pipeline.cost_report()).into_response()
}

#[derive(Deserialize)]
struct CostsAction {
    action: Option<String>,
}

/// `POST /costs?action=reset` zeroes the accounting.
async fn costs_action(State(pipeline): State<Arc<Pipeline>>, Query(query): Query<CostsAction>) -> Response {
    match query.action.as_deref() {
        Some("reset") => {
            pipeline.reset_costs();
            Json(serde_json::json!({"reset": true})).into_response()
        }
        _ => GatewayError::InvalidRequest("unsupported costs action, expected action=reset".to_string()).into_response(),
    }
}

/// Anonymous root: name, version, and the exposed surface.
async fn root() -> Response {
    Json(serde_json::json!({
        "name": "switchyard",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/v1/messages",
            "/v1/models",
            "/health",
            "/metrics",
            "/metrics/prometheus",
            "/costs",
        ],
    }))
    .into_response()
}
