//! Full-stack test: a real listener with auth and rate limiting layered
//! over the gateway, talking to a scripted upstream over real sockets.

use std::{collections::BTreeMap, net::SocketAddr, time::Duration};

use axum::{Json, Router, routing::post};
use config::{
    AuthConfig, BreakerConfig, CacheConfig, Config, ProviderConfig, ProviderKind, QueueConfig, RateLimitConfig,
};
use secrecy::SecretString;
use server::{ServeConfig, serve};
use tokio_util::sync::CancellationToken;

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async {
            Json(serde_json::json!({
                "id": "chatcmpl-1",
                "model": "m",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "hello back"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 2, "completion_tokens": 2, "total_tokens": 4}
            }))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn gateway_config(upstream: SocketAddr) -> Config {
    let mut providers = BTreeMap::new();
    providers.insert(
        ProviderKind::Groq,
        ProviderConfig {
            api_key: Some(SecretString::from("upstream-key")),
            base_url: Some(format!("http://{upstream}")),
            deployment: None,
            api_version: None,
        },
    );

    Config {
        // Port 0 binds an ephemeral port; the bound address comes back via
        // the oneshot channel.
        port: 0,
        log_filter: "warn".to_string(),
        provider: ProviderKind::Groq,
        providers,
        tier_routing: false,
        tiers: BTreeMap::new(),
        fallback: None,
        tier_models: BTreeMap::new(),
        model_aliases: Vec::new(),
        rate_limit: RateLimitConfig::default(),
        cache: CacheConfig::default(),
        auth: AuthConfig {
            enabled: true,
            api_key: Some(SecretString::from("gateway-key")),
            anonymous_metrics: false,
        },
        queue: QueueConfig::default(),
        breaker: BreakerConfig::default(),
        upstream_timeout: Duration::from_secs(5),
        responses_model_prefixes: Vec::new(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn authenticated_round_trip_through_a_real_listener() {
    let upstream = spawn_upstream().await;
    let shutdown = CancellationToken::new();

    let (addr_tx, addr_rx) = tokio::sync::oneshot::channel();
    let server_task = tokio::spawn(serve(ServeConfig {
        config: gateway_config(upstream),
        shutdown: shutdown.clone(),
        bound_addr_sender: Some(addr_tx),
    }));

    let bound = addr_rx.await.unwrap();
    let client = reqwest::Client::new();
    let base = format!("http://{bound}");

    // Health is anonymous.
    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let body = serde_json::json!({
        "model": "m",
        "max_tokens": 32,
        "messages": [{"role": "user", "content": "hello"}]
    });

    // No credentials: rejected with the standard error envelope.
    let rejected = client
        .post(format!("{base}/v1/messages"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 401);
    let error: serde_json::Value = rejected.json().await.unwrap();
    assert_eq!(error["error"]["type"], "authentication_error");

    // With the gateway key: translated response from the upstream.
    let accepted = client
        .post(format!("{base}/v1/messages"))
        .header("x-api-key", "gateway-key")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 200);

    let response: serde_json::Value = accepted.json().await.unwrap();
    assert_eq!(response["type"], "message");
    assert_eq!(response["role"], "assistant");
    assert_eq!(response["content"][0]["text"], "hello back");
    assert_eq!(response["stop_reason"], "end_turn");

    // Metrics require credentials unless opted out.
    let metrics = client.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(metrics.status(), 401);

    // Close pooled connections so graceful shutdown completes promptly.
    drop(client);

    shutdown.cancel();
    server_task.await.unwrap().unwrap();
}
