//! End-to-end pipeline tests against a scripted in-process upstream.

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    response::Response,
    routing::post,
};
use config::{
    AuthConfig, BreakerConfig, CacheConfig, Config, FallbackTarget, ProviderConfig, ProviderKind, QueueConfig,
    RateLimitConfig, Tier, TierRoute,
};
use gateway::Pipeline;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// What the scripted upstream should do.
#[derive(Clone)]
struct UpstreamScript {
    /// Respond 500 to this many requests before succeeding.
    fail_first: u32,
    /// Status used for scripted failures.
    failure_status: StatusCode,
    /// Body returned on success.
    success_body: serde_json::Value,
}

#[derive(Clone)]
struct UpstreamState {
    script: UpstreamScript,
    hits: Arc<AtomicU32>,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn upstream_handler(State(state): State<UpstreamState>, Json(body): Json<serde_json::Value>) -> Response {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst);
    state.bodies.lock().unwrap().push(body);

    if hit < state.script.fail_first {
        return Response::builder()
            .status(state.script.failure_status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"error":{"message":"scripted failure"}}"#))
            .unwrap();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(state.script.success_body.to_string()))
        .unwrap()
}

/// Spawn a chat-shaped upstream; returns its address and observation
/// handles.
async fn spawn_upstream(script: UpstreamScript) -> (SocketAddr, Arc<AtomicU32>, Arc<Mutex<Vec<serde_json::Value>>>) {
    let state = UpstreamState {
        script,
        hits: Arc::new(AtomicU32::new(0)),
        bodies: Arc::new(Mutex::new(Vec::new())),
    };

    let hits = state.hits.clone();
    let bodies = state.bodies.clone();

    let app = Router::new()
        .route("/chat/completions", post(upstream_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hits, bodies)
}

fn chat_success(model: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

fn base_config(port: u16) -> Config {
    Config {
        port,
        log_filter: "info".to_string(),
        provider: ProviderKind::Groq,
        providers: BTreeMap::new(),
        tier_routing: false,
        tiers: BTreeMap::new(),
        fallback: None,
        tier_models: BTreeMap::new(),
        model_aliases: Vec::new(),
        rate_limit: RateLimitConfig::default(),
        cache: CacheConfig::default(),
        auth: AuthConfig::default(),
        queue: QueueConfig::default(),
        breaker: BreakerConfig::default(),
        upstream_timeout: Duration::from_secs(10),
        responses_model_prefixes: Vec::new(),
    }
}

fn provider_entry(addr: SocketAddr) -> ProviderConfig {
    ProviderConfig {
        api_key: Some("test-key".into()),
        base_url: Some(format!("http://{addr}")),
        deployment: None,
        api_version: None,
    }
}

fn app(config: Config) -> Router {
    let pipeline = Arc::new(Pipeline::new(Arc::new(config), CancellationToken::new()));
    gateway::router(pipeline)
}

fn messages_request(body: &serde_json::Value) -> Request<Body> {
    Request::post("/v1/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn tier_routing_rewrites_model_and_maps_stop_reason() {
    let (addr, hits, bodies) = spawn_upstream(UpstreamScript {
        fail_first: 0,
        failure_status: StatusCode::INTERNAL_SERVER_ERROR,
        success_body: chat_success("a-mid", "routed"),
    })
    .await;

    let mut config = base_config(59101);
    config.provider = ProviderKind::Ollama;
    config.tier_routing = true;
    config.tiers.insert(
        Tier::Mid,
        TierRoute {
            provider: ProviderKind::Groq,
            model: Some("a-mid".to_string()),
            api_key: Some("tier-key".into()),
            base_url: Some(format!("http://{addr}")),
            fallback: None,
        },
    );

    let app = app(config);

    let response = app
        .oneshot(messages_request(&serde_json::json!({
            "model": "mid-sonnet-1",
            "max_tokens": 64,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["model"], "a-mid");
    assert_eq!(json["stop_reason"], "end_turn");
    assert_eq!(json["content"][0]["text"], "routed");

    // The upstream saw the tier-configured model, not the requested one.
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let seen = bodies.lock().unwrap();
    assert_eq!(seen[0]["model"], "a-mid");
    // And the translated chat shape, not the source shape.
    assert_eq!(seen[0]["messages"][0]["role"], "user");
}

#[tokio::test(flavor = "multi_thread")]
async fn fallback_serves_after_primary_exhausts_retries() {
    let (primary_addr, primary_hits, _) = spawn_upstream(UpstreamScript {
        fail_first: u32::MAX,
        failure_status: StatusCode::SERVICE_UNAVAILABLE,
        success_body: serde_json::json!({}),
    })
    .await;

    let (fallback_addr, fallback_hits, fallback_bodies) = spawn_upstream(UpstreamScript {
        fail_first: 0,
        failure_status: StatusCode::INTERNAL_SERVER_ERROR,
        success_body: chat_success("b-fallback", "rescued"),
    })
    .await;

    let mut config = base_config(59102);
    config.providers.insert(ProviderKind::Groq, provider_entry(primary_addr));
    config.fallback = Some(FallbackTarget {
        provider: ProviderKind::Mistral,
        model: Some("b-fallback".to_string()),
        api_key: Some("fb-key".into()),
        base_url: Some(format!("http://{fallback_addr}")),
    });

    let app = app(config);

    let response = app
        .oneshot(messages_request(&serde_json::json!({
            "model": "anything",
            "max_tokens": 64,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-fallback").unwrap(), "true");

    let json = response_json(response).await;
    assert_eq!(json["model"], "b-fallback");
    assert_eq!(json["content"][0]["text"], "rescued");

    // Three primary attempts, one fallback attempt.
    assert_eq!(primary_hits.load(Ordering::SeqCst), 3);
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);

    // The fallback dispatch was re-serialized for its own model.
    assert_eq!(fallback_bodies.lock().unwrap()[0]["model"], "b-fallback");
}

#[tokio::test(flavor = "multi_thread")]
async fn cache_serves_identical_deterministic_requests() {
    let (addr, hits, _) = spawn_upstream(UpstreamScript {
        fail_first: 0,
        failure_status: StatusCode::INTERNAL_SERVER_ERROR,
        success_body: chat_success("m", "cached answer"),
    })
    .await;

    let mut config = base_config(59103);
    config.providers.insert(ProviderKind::Groq, provider_entry(addr));
    config.cache = CacheConfig {
        enabled: true,
        max_entries: 16,
        ttl: Duration::from_secs(60),
    };

    let app = app(config);

    let request_body = serde_json::json!({
        "model": "deterministic-model",
        "max_tokens": 64,
        "messages": [{"role": "user", "content": "hello"}]
    });

    let first = app.clone().oneshot(messages_request(&request_body)).await.unwrap();
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    let first_body = response_json(first).await;

    let second = app.clone().oneshot(messages_request(&request_body)).await.unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");
    let second_body = response_json(second).await;

    // Identical body, zero additional upstream calls.
    assert_eq!(first_body, second_body);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Changing max_tokens by one misses and dispatches.
    let mut changed = request_body.clone();
    changed["max_tokens"] = serde_json::json!(65);

    let third = app.oneshot(messages_request(&changed)).await.unwrap();
    assert_eq!(third.headers().get("x-cache").unwrap(), "MISS");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn upstream_4xx_is_forwarded_verbatim() {
    let (addr, hits, _) = spawn_upstream(UpstreamScript {
        fail_first: u32::MAX,
        failure_status: StatusCode::BAD_REQUEST,
        success_body: serde_json::json!({}),
    })
    .await;

    let mut config = base_config(59104);
    config.providers.insert(ProviderKind::Groq, provider_entry(addr));

    let app = app(config);

    let response = app
        .oneshot(messages_request(&serde_json::json!({
            "model": "m",
            "max_tokens": 64,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .await
        .unwrap();

    // No retries on 4xx, original status and body.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let json = response_json(response).await;
    assert_eq!(json["error"]["message"], "scripted failure");
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_requests_are_rejected_without_dispatch() {
    let mut config = base_config(59105);
    config
        .providers
        .insert(ProviderKind::Groq, provider_entry("127.0.0.1:1".parse().unwrap()));

    let app = app(config);

    // Missing model.
    let response = app
        .clone()
        .oneshot(messages_request(&serde_json::json!({
            "model": "",
            "max_tokens": 64,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["error"]["type"], "invalid_request_error");

    // Empty body.
    let response = app
        .clone()
        .oneshot(
            Request::post("/v1/messages")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Empty messages array.
    let response = app
        .oneshot(messages_request(&serde_json::json!({
            "model": "m",
            "max_tokens": 64,
            "messages": []
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn model_aliases_resolve_before_dispatch() {
    let (addr, _, bodies) = spawn_upstream(UpstreamScript {
        fail_first: 0,
        failure_status: StatusCode::INTERNAL_SERVER_ERROR,
        success_body: chat_success("real-model", "aliased"),
    })
    .await;

    let mut config = base_config(59106);
    config.providers.insert(ProviderKind::Groq, provider_entry(addr));
    config.model_aliases = vec![("fast".to_string(), "real-model".to_string())];

    let app = app(config);

    let response = app
        .oneshot(messages_request(&serde_json::json!({
            "model": "FAST",
            "max_tokens": 64,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(bodies.lock().unwrap()[0]["model"], "real-model");
}

#[tokio::test(flavor = "multi_thread")]
async fn overload_status_passes_through_unretried() {
    let (addr, hits, _) = spawn_upstream(UpstreamScript {
        fail_first: u32::MAX,
        failure_status: StatusCode::from_u16(529).unwrap(),
        success_body: serde_json::json!({}),
    })
    .await;

    let mut config = base_config(59109);
    config.providers.insert(ProviderKind::Groq, provider_entry(addr));
    // A configured fallback must NOT be attempted for overload signals.
    config.fallback = Some(FallbackTarget {
        provider: ProviderKind::Mistral,
        model: None,
        api_key: Some("fb-key".into()),
        base_url: Some("http://127.0.0.1:1".to_string()),
    });

    let app = app(config);

    let response = app
        .oneshot(messages_request(&serde_json::json!({
            "model": "m",
            "max_tokens": 64,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 529);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn responses_envelope_serves_reasoning_models() {
    let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
    let capture = seen.clone();

    let envelope = serde_json::json!({
        "id": "resp_1",
        "model": "o3-mini-2025",
        "status": "completed",
        "output": [
            {"type": "reasoning", "summary": [{"type": "summary_text", "text": "Short puzzle."}]},
            {"type": "message", "role": "assistant", "content": [{"type": "output_text", "text": "42."}]}
        ],
        "usage": {"input_tokens": 8, "output_tokens": 3}
    });

    let upstream = Router::new().route(
        "/responses",
        post(move |Json(body): Json<serde_json::Value>| {
            let capture = capture.clone();
            let envelope = envelope.clone();
            async move {
                capture.lock().unwrap().push(body);
                Json(envelope)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });

    let mut config = base_config(59110);
    config.provider = ProviderKind::Openai;
    config.providers.insert(ProviderKind::Openai, provider_entry(addr));
    config.responses_model_prefixes = vec!["o3".to_string()];

    let app = app(config);

    let response = app
        .oneshot(messages_request(&serde_json::json!({
            "model": "o3-mini",
            "max_tokens": 256,
            "thinking": {"type": "enabled", "budget_tokens": 1024},
            "messages": [{"role": "user", "content": "The answer?"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["model"], "o3-mini-2025");
    assert_eq!(json["stop_reason"], "end_turn");
    assert_eq!(json["content"][0]["type"], "thinking");
    assert_eq!(json["content"][0]["thinking"], "Short puzzle.");
    assert_eq!(json["content"][1]["type"], "text");
    assert_eq!(json["content"][1]["text"], "42.");
    assert_eq!(json["usage"]["output_tokens"], 3);

    // The upstream saw the responses envelope with reasoning requested.
    let bodies = seen.lock().unwrap();
    assert_eq!(bodies[0]["model"], "o3-mini");
    assert_eq!(bodies[0]["input"][0]["type"], "message");
    assert_eq!(bodies[0]["input"][0]["content"][0]["type"], "input_text");
    assert_eq!(bodies[0]["store"], false);
    assert_eq!(bodies[0]["reasoning"]["summary"], "auto");
}

#[tokio::test(flavor = "multi_thread")]
async fn native_dialect_is_passed_through_untouched() {
    let native_body = serde_json::json!({
        "id": "msg_upstream",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": "native"}],
        "model": "claude-sonnet-4-20250514",
        "stop_reason": "end_turn",
        "stop_sequence": null,
        "usage": {"input_tokens": 4, "output_tokens": 2}
    });

    let echoed = native_body.clone();
    let upstream = Router::new().route(
        "/v1/messages",
        post(move || {
            let echoed = echoed.clone();
            async move { Json(echoed) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });

    let mut config = base_config(59111);
    config.provider = ProviderKind::Anthropic;
    config.providers.insert(ProviderKind::Anthropic, provider_entry(addr));

    let app = app(config);

    let response = app
        .oneshot(messages_request(&serde_json::json!({
            "model": "claude-sonnet-4-20250514",
            "max_tokens": 64,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-passthrough").unwrap(), "true");

    // The upstream body is echoed as-is, upstream message id included.
    let json = response_json(response).await;
    assert_eq!(json, native_body);
}

#[tokio::test(flavor = "multi_thread")]
async fn circuit_opens_rejects_and_recovers() {
    let (addr, hits, _) = spawn_upstream(UpstreamScript {
        // Two failing requests at three attempts each, then success.
        fail_first: 6,
        failure_status: StatusCode::INTERNAL_SERVER_ERROR,
        success_body: chat_success("m", "recovered"),
    })
    .await;

    let mut config = base_config(59107);
    config.providers.insert(ProviderKind::Groq, provider_entry(addr));
    config.breaker = BreakerConfig {
        enabled: true,
        failure_threshold: 2,
        open_timeout: Duration::from_secs(1),
        recovery_threshold: 2,
    };

    let app = app(config);

    let body = serde_json::json!({
        "model": "m",
        "max_tokens": 64,
        "messages": [{"role": "user", "content": "hello"}]
    });

    // Two failing requests trip the breaker.
    for _ in 0..2 {
        let response = app.clone().oneshot(messages_request(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
    let after_failures = hits.load(Ordering::SeqCst);
    assert_eq!(after_failures, 6);

    // Third request is rejected without touching the upstream.
    let response = app.clone().oneshot(messages_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers().get("x-circuit-breaker").unwrap(), "open");
    assert_eq!(hits.load(Ordering::SeqCst), after_failures);

    // After the timeout, probes are admitted and recovery closes the
    // circuit.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    for _ in 0..2 {
        let response = app.clone().oneshot(messages_request(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let health = app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    let json = response_json(health).await;
    assert_eq!(json["circuit_breaker"], "closed");
}

#[tokio::test(flavor = "multi_thread")]
async fn streaming_tool_call_translates_into_block_lifecycle() {
    // A scripted SSE upstream: text delta, tool-call start, argument
    // fragment, finish, [DONE].
    let sse_body = indoc::indoc! {r#"
        data: {"id":"c1","choices":[{"index":0,"delta":{"role":"assistant","content":"Let me check. "}}]}

        data: {"id":"c1","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_weather","arguments":"{\"city\":\"Par"}}]}}]}

        data: {"id":"c1","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"is\"}"}}]},"finish_reason":"tool_calls"}]}

        data: [DONE]

    "#};

    let upstream = Router::new().route(
        "/chat/completions",
        post(move || async move {
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Body::from(sse_body))
                .unwrap()
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });

    let mut config = base_config(59108);
    config.providers.insert(ProviderKind::Groq, provider_entry(addr));

    let app = app(config);

    let response = app
        .oneshot(messages_request(&serde_json::json!({
            "model": "m",
            "max_tokens": 64,
            "stream": true,
            "messages": [{"role": "user", "content": "weather in Paris?"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/event-stream");
    assert_eq!(response.headers().get("x-accel-buffering").unwrap(), "no");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let event_names: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("event: "))
        .collect();

    assert_eq!(
        event_names,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_stop",
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );

    // The tool block carries the upstream call id and name.
    assert!(text.contains(r#""id":"call_1""#));
    assert!(text.contains(r#""name":"get_weather""#));
    // Argument fragments are forwarded verbatim.
    assert!(text.contains(r#""partial_json":"{\"city\":\"Par""#));
    // The final message delta maps the finish reason.
    assert!(text.contains(r#""stop_reason":"tool_use""#));
}
