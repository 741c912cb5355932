use std::time::Duration;

use axum::http;
use reqwest::Client;

/// Build the shared upstream HTTP client.
///
/// One client (and its connection pool) serves every provider. The request
/// timeout is process-wide and generous by default: reasoning-class models
/// can legitimately take minutes to answer. Idle connections are bounded
/// per host so a burst against one provider cannot exhaust the pool.
pub(crate) fn build_http_client(timeout: Duration) -> Client {
    let mut headers = http::HeaderMap::new();
    headers.insert(http::header::CONNECTION, http::HeaderValue::from_static("keep-alive"));

    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
        .build()
        .unwrap_or_else(|e| {
            log::error!("failed to build tuned HTTP client, using defaults: {e}");
            Client::new()
        })
}
