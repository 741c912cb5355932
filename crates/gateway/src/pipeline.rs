//! The request pipeline: everything between the listener and the upstream.
//!
//! One pipeline serves every request. Optional components (rate limiting is
//! layered in the server crate; cache, queue, circuit breaker here) are
//! constructed as disabled sentinels rather than branched around, so the
//! stage sequence is identical whatever the configuration:
//!
//! parse → alias → cache probe → tier selection → queue admission →
//! breaker gate → primary dispatch (translate or passthrough, retry loop) →
//! optional fallback → response assembly (buffered or streaming) → cost
//! recording → cache store.
//!
//! Provider selection produces an immutable [`DispatchPlan`] per request;
//! adapters themselves carry no request state and are shared freely.

use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use config::{Config, FallbackTarget, ProviderKind, Tier, TierRoute};
use tokio_util::sync::CancellationToken;

use crate::{
    breaker::{BreakerState, CircuitBreaker},
    cache::{CacheStats, ResponseCache},
    cost::{CostReport, CostTracker, Pricing},
    error::{GatewayError, Result},
    http_client::build_http_client,
    messages::anthropic::{
        ContentBlock, MessagesRequest, MessagesResponse, ModelInfo, ModelsResponse, StopReason, Usage,
    },
    metrics::{Metrics, MetricsSnapshot},
    provider::{Adapter, WireShape},
    queue::RequestQueue,
    status::{StatusDocument, StatusPublisher},
    streaming::{self, CompletionHook, chat::ChatStreamTranslator, responses::ResponsesStreamTranslator},
    translate::{CallIdBridge, chat as chat_translate, responses as responses_translate},
};

/// Attempts per (request, adapter) pair, first try included.
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff between attempts; doubles per retry.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upstream status treated as a long overload: passed through, never
/// retried.
const OVERLOADED_STATUS: u16 = 529;

/// A provider bound to an optional model override (tier routes and
/// fallbacks carry their own model).
#[derive(Clone)]
struct ExecutionTarget {
    adapter: Adapter,
    model_override: Option<String>,
}

struct Targets {
    default: ExecutionTarget,
    tiers: BTreeMap<Tier, ExecutionTarget>,
    tier_fallbacks: BTreeMap<Tier, ExecutionTarget>,
    global_fallback: Option<ExecutionTarget>,
}

/// Everything needed to execute one dispatch: captured as local values at
/// selection time so nothing request-scoped ever lands on a shared adapter.
struct DispatchPlan {
    adapter: Adapter,
    url: String,
    body: Bytes,
    shape: WireShape,
    target_model: String,
    bridge: Option<CallIdBridge>,
}

/// Heartbeat state shared with stream-completion hooks.
pub(crate) struct StatusBeat {
    publisher: Option<StatusPublisher>,
    port: u16,
    provider: String,
    model: String,
    started_at: String,
    metrics: Arc<Metrics>,
}

impl StatusBeat {
    /// Rewrite the status file with current counters.
    pub(crate) fn beat(&self) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let (requests, errors) = self.metrics.request_counts();

        let document = StatusDocument {
            port: self.port,
            pid: std::process::id(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            requests,
            errors,
            started_at: self.started_at.clone(),
            updated_at: jiff::Timestamp::now().to_string(),
        };

        if let Err(e) = publisher.publish(&document) {
            log::warn!("failed to publish status file: {e}");
        }
    }

    fn remove(&self) {
        if let Some(publisher) = &self.publisher {
            publisher.remove();
        }
    }
}

/// The assembled pipeline. Shared across every worker; all interior state
/// is atomics or mutex-guarded maps.
pub struct Pipeline {
    config: Arc<Config>,
    client: reqwest::Client,
    targets: Targets,
    cache: ResponseCache,
    breaker: CircuitBreaker,
    queue: RequestQueue,
    cost: Arc<CostTracker>,
    metrics: Arc<Metrics>,
    beat: Arc<StatusBeat>,
    shutdown: CancellationToken,
}

impl Pipeline {
    /// Assemble the pipeline from configuration. Disabled components come
    /// up as pass-through sentinels.
    pub fn new(config: Arc<Config>, shutdown: CancellationToken) -> Self {
        let client = build_http_client(config.upstream_timeout);
        let prefixes = &config.responses_model_prefixes;

        let default = ExecutionTarget {
            adapter: Adapter::new(config.provider, config.provider_config(config.provider), prefixes),
            model_override: None,
        };

        let mut tiers = BTreeMap::new();
        let mut tier_fallbacks = BTreeMap::new();

        if config.tier_routing {
            for (tier, route) in &config.tiers {
                tiers.insert(*tier, tier_target(&config, route, prefixes));

                if let Some(fallback) = &route.fallback {
                    tier_fallbacks.insert(*tier, fallback_target(&config, fallback, prefixes));
                }
            }
        }

        let global_fallback = config
            .fallback
            .as_ref()
            .map(|fallback| fallback_target(&config, fallback, prefixes));

        let metrics = Arc::new(Metrics::new());

        let publisher = match StatusPublisher::new(config.port) {
            Ok(publisher) => Some(publisher),
            Err(e) => {
                log::warn!("status publishing disabled: {e}");
                None
            }
        };

        let beat = Arc::new(StatusBeat {
            publisher,
            port: config.port,
            provider: config.provider.to_string(),
            model: config
                .tier_models
                .get(&Tier::Mid)
                .cloned()
                .unwrap_or_else(|| "passthrough".to_string()),
            started_at: jiff::Timestamp::now().to_string(),
            metrics: metrics.clone(),
        });

        beat.beat();

        Self {
            client,
            cache: ResponseCache::new(&config.cache),
            breaker: CircuitBreaker::new(&config.breaker),
            queue: RequestQueue::new(&config.queue, shutdown.clone()),
            cost: Arc::new(CostTracker::new()),
            metrics,
            beat,
            shutdown,
            targets: Targets {
                default,
                tiers,
                tier_fallbacks,
                global_fallback,
            },
            config,
        }
    }

    /// Handle one `POST /v1/messages` request body.
    pub async fn handle_messages(&self, raw_body: Bytes) -> Response {
        let started = Instant::now();
        let cancel = self.shutdown.child_token();

        let result = self.execute(raw_body, &cancel, started).await;
        self.beat.beat();

        match result {
            Ok(response) => response,
            Err(error) => {
                self.metrics.record_error(started.elapsed());
                axum::response::IntoResponse::into_response(error)
            }
        }
    }

    async fn execute(&self, raw_body: Bytes, cancel: &CancellationToken, started: Instant) -> Result<Response> {
        // Stage 1: parse and validate.
        if raw_body.is_empty() {
            return Err(GatewayError::InvalidRequest("request body is empty".to_string()));
        }

        let mut request: MessagesRequest = serde_json::from_slice(&raw_body)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid request body: {e}")))?;

        if request.model.is_empty() {
            return Err(GatewayError::InvalidRequest("model is required".to_string()));
        }
        if request.messages.is_empty() {
            return Err(GatewayError::InvalidRequest("messages must not be empty".to_string()));
        }

        // Stage 2: alias resolution.
        let resolved = self.config.resolve_alias(&request.model).to_string();
        if resolved != request.model {
            log::debug!("alias resolved '{}' -> '{resolved}'", request.model);
            request.model = resolved;
        }

        let streaming_requested = request.stream.unwrap_or(false);

        // Stage 3: cache probe.
        let cache_key = (ResponseCache::eligible(&request)).then(|| ResponseCache::key(&request));

        if let Some(key) = &cache_key
            && let Some(hit) = self.cache.get(key)
        {
            log::debug!("cache hit for model '{}'", request.model);
            self.metrics
                .record_success(started.elapsed(), false, response_uses_tools(&hit));
            return Ok(json_response(StatusCode::OK, &*hit, &[("x-cache", "HIT")]));
        }

        // Stage 4: provider selection, captured as locals.
        let tier = Tier::detect(&request.model);
        let target = self.select_target(tier);
        let target_model = self.effective_model(target, tier, &request.model);

        // Queue admission, then the breaker gate.
        self.queue
            .admit(cancel)
            .await
            .map_err(|e| GatewayError::Overloaded(e.to_string()))?;

        if !self.breaker.try_acquire() {
            return Err(GatewayError::CircuitOpen);
        }

        // Stages 6-8: serialize and dispatch the primary.
        let mut plan = build_plan(target, &request, &target_model, streaming_requested, &raw_body)?;

        if streaming_requested && !plan.adapter.supports_streaming() {
            return Err(GatewayError::InvalidRequest(format!(
                "provider '{}' does not support streaming, set stream=false",
                plan.adapter.name()
            )));
        }

        log::debug!(
            "dispatching model '{target_model}' to {} ({})",
            plan.adapter.name(),
            plan.url
        );

        let primary = self.dispatch_with_retry(&plan, cancel).await;

        let response = match primary {
            Ok(response) if response.status().is_success() => {
                self.record_upstream_success();
                return self
                    .assemble(plan, request, response, cache_key, started, false)
                    .await;
            }
            Ok(response) if !retryable_status(response.status()) => {
                // 4xx and 529: the upstream's error is authoritative.
                self.note_upstream_status(response.status());
                self.metrics.record_error(started.elapsed());
                return forward_upstream(response).await;
            }
            other => other,
        };

        // Stage 9: one fallback attempt.
        self.record_upstream_failure();

        let Some(fallback) = self.fallback_target(tier) else {
            return Err(primary_failure_error(response, plan.adapter.name()).await);
        };

        self.metrics.record_fallback_attempt();

        let fallback_model = fallback
            .model_override
            .clone()
            .unwrap_or_else(|| target_model.clone());

        // Re-serialize for the fallback's target model and wire shape.
        plan = build_plan(fallback, &request, &fallback_model, streaming_requested, &raw_body)?;

        log::info!(
            "primary dispatch failed, attempting fallback to {} with model '{fallback_model}'",
            plan.adapter.name()
        );

        match self.dispatch_once(&plan).await {
            Ok(response) if response.status().is_success() => {
                self.metrics.record_fallback_success();
                self.assemble(plan, request, response, cache_key, started, true).await
            }
            Ok(response) => {
                let status = response.status();
                log::error!("fallback to {} failed with status {status}", plan.adapter.name());
                Err(GatewayError::Api(format!(
                    "primary and fallback providers failed (fallback status {status})"
                )))
            }
            Err(e) => {
                log::error!("fallback dispatch failed: {e}");
                Err(GatewayError::Api("primary and fallback providers failed".to_string()))
            }
        }
    }

    /// The retry loop: up to [`MAX_ATTEMPTS`] tries, retrying only network
    /// errors and retryable 5xx statuses, with exponential backoff that
    /// honors cancellation between attempts.
    async fn dispatch_with_retry(&self, plan: &DispatchPlan, cancel: &CancellationToken) -> Result<reqwest::Response> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.dispatch_once(plan).await {
                Ok(response) => {
                    let status = response.status();

                    if !retryable_status(status) || attempt >= MAX_ATTEMPTS {
                        return Ok(response);
                    }

                    log::warn!(
                        "upstream {} returned {status}, retrying (attempt {attempt}/{MAX_ATTEMPTS})",
                        plan.adapter.name()
                    );
                }
                Err(e) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(e);
                    }

                    log::warn!(
                        "upstream {} dispatch error, retrying (attempt {attempt}/{MAX_ATTEMPTS}): {e}",
                        plan.adapter.name()
                    );
                }
            }

            let backoff = BACKOFF_BASE * 2u32.saturating_pow(attempt - 1);

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => {
                    return Err(GatewayError::Api("request canceled during retry backoff".to_string()));
                }
            }
        }
    }

    async fn dispatch_once(&self, plan: &DispatchPlan) -> Result<reqwest::Response> {
        let builder = self
            .client
            .post(&plan.url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(plan.body.clone());

        plan.adapter
            .apply_auth(builder, None)
            .send()
            .await
            .map_err(|e| GatewayError::Api(format!("connection to {} failed: {e}", plan.adapter.name())))
    }

    /// Stages 11-12: translate (or pass through) a successful upstream
    /// response, record cost, store in cache, and build the client
    /// response.
    async fn assemble(
        &self,
        plan: DispatchPlan,
        request: MessagesRequest,
        response: reqwest::Response,
        cache_key: Option<String>,
        started: Instant,
        via_fallback: bool,
    ) -> Result<Response> {
        let mut extra_headers: Vec<(&'static str, &'static str)> = Vec::new();

        if via_fallback {
            extra_headers.push(("x-fallback", "true"));
        }
        if !plan.adapter.requires_translation() {
            extra_headers.push(("x-passthrough", "true"));
        }

        if request.stream.unwrap_or(false) {
            return Ok(self.assemble_stream(plan, response, started, &extra_headers));
        }

        if cache_key.is_some() {
            extra_headers.push(("x-cache", "MISS"));
        }

        let raw = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Api(format!("failed to read upstream response: {e}")))?;

        let translated = match plan.shape {
            WireShape::Chat => {
                let chat = serde_json::from_slice(&raw)
                    .map_err(|e| GatewayError::Api(format!("unparsable upstream response: {e}")))?;
                chat_translate::from_chat_response(chat, &plan.target_model)
            }
            WireShape::Responses => {
                let envelope = serde_json::from_slice(&raw)
                    .map_err(|e| GatewayError::Api(format!("unparsable upstream response: {e}")))?;
                let bridge = plan.bridge.unwrap_or_default();
                responses_translate::from_responses_response(envelope, &plan.target_model, &bridge)
            }
            WireShape::Messages => serde_json::from_slice(&raw)
                .map_err(|e| GatewayError::Api(format!("unparsable upstream response: {e}")))?,
        };

        self.cost.record_usage(
            plan.adapter.name(),
            &translated.model,
            u64::from(translated.usage.input_tokens),
            u64::from(translated.usage.output_tokens),
        );

        let tool_use = response_uses_tools(&translated);
        self.metrics.record_success(started.elapsed(), false, tool_use);

        let translated = Arc::new(translated);
        if let Some(key) = cache_key {
            self.cache.put(key, translated.clone());
        }

        // Passthrough responses are echoed byte-for-byte; translated ones
        // are re-serialized from the source-dialect value.
        let body = match plan.shape {
            WireShape::Messages => raw,
            _ => Bytes::from(serde_json::to_vec(&*translated).map_err(|e| GatewayError::Internal(e.to_string()))?),
        };

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json");
        for (name, value) in &extra_headers {
            builder = builder.header(*name, *value);
        }

        builder
            .body(Body::from(body))
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }

    /// Stage 12: wire a streaming upstream into the client connection.
    fn assemble_stream(
        &self,
        plan: DispatchPlan,
        response: reqwest::Response,
        started: Instant,
        extra_headers: &[(&'static str, &'static str)],
    ) -> Response {
        let hook = self.stream_completion_hook(plan.adapter.kind(), plan.target_model.clone(), started);

        let body = match plan.shape {
            WireShape::Messages => {
                // Byte-for-byte copy; usage is not recoverable here.
                self.metrics.record_success(started.elapsed(), true, false);
                streaming::passthrough_body(response)
            }
            WireShape::Chat => streaming::pump(response, ChatStreamTranslator::new(plan.target_model.clone()), hook),
            WireShape::Responses => streaming::pump(
                response,
                ResponsesStreamTranslator::new(plan.target_model.clone(), plan.bridge.unwrap_or_default()),
                hook,
            ),
        };

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .header("x-accel-buffering", "no");

        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }

        builder.body(body).unwrap_or_else(|e| {
            log::error!("failed to build streaming response: {e}");
            Response::new(Body::empty())
        })
    }

    /// Cost and metrics recording for translated streams, run when the
    /// stream closes.
    fn stream_completion_hook(&self, provider: ProviderKind, model: String, started: Instant) -> CompletionHook {
        let cost = self.cost.clone();
        let metrics = self.metrics.clone();
        let beat = self.beat.clone();

        Box::new(move |usage: Usage, stop_reason: Option<StopReason>| {
            cost.record_usage(
                provider.as_str(),
                &model,
                u64::from(usage.input_tokens),
                u64::from(usage.output_tokens),
            );
            metrics.record_success(started.elapsed(), true, stop_reason == Some(StopReason::ToolUse));
            beat.beat();
        })
    }

    fn select_target(&self, tier: Option<Tier>) -> &ExecutionTarget {
        if self.config.tier_routing
            && let Some(tier) = tier
            && let Some(target) = self.targets.tiers.get(&tier)
        {
            return target;
        }

        &self.targets.default
    }

    fn fallback_target(&self, tier: Option<Tier>) -> Option<&ExecutionTarget> {
        tier.and_then(|tier| self.targets.tier_fallbacks.get(&tier))
            .or(self.targets.global_fallback.as_ref())
    }

    /// Effective target model: the tier-configured value, else the default
    /// mapping, else the requested name; adapter-specific rewrite last.
    fn effective_model(&self, target: &ExecutionTarget, tier: Option<Tier>, requested: &str) -> String {
        let model = target
            .model_override
            .clone()
            .or_else(|| tier.and_then(|tier| self.config.tier_models.get(&tier).cloned()))
            .unwrap_or_else(|| requested.to_string());

        target.adapter.rewrite_model(&model).into_owned()
    }

    fn record_upstream_success(&self) {
        self.breaker.record_success();
        self.queue.resume();
    }

    fn record_upstream_failure(&self) {
        self.breaker.record_failure();
        if self.breaker.state() == BreakerState::Open {
            self.queue.pause();
        }
    }

    fn note_upstream_status(&self, status: StatusCode) {
        if status.as_u16() == OVERLOADED_STATUS {
            // Overload signals count against the breaker even though they
            // are passed through unretried.
            self.record_upstream_failure();
        } else {
            self.record_upstream_success();
        }
    }

    /// Aggregate model discovery across every configured provider.
    pub async fn list_models(&self) -> ModelsResponse {
        let mut data: Vec<ModelInfo> = Vec::new();

        for (kind, provider_config) in &self.config.providers {
            let adapter = Adapter::new(*kind, Some(provider_config), &self.config.responses_model_prefixes);

            match adapter.list_models(&self.client).await {
                Ok(models) => data.extend(models),
                Err(e) => log::debug!("model discovery for {kind} failed: {e:#}"),
            }
        }

        ModelsResponse { data, has_more: false }
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    pub fn prometheus_text(&self) -> String {
        self.metrics.to_prometheus(&self.cache.stats(), self.breaker.state())
    }

    pub fn cost_report(&self) -> CostReport {
        self.cost.report()
    }

    pub fn reset_costs(&self) {
        self.cost.reset();
        log::info!("cost accounting reset");
    }

    pub fn set_custom_pricing(&self, model: impl Into<String>, pricing: Pricing) {
        self.cost.set_custom_pricing(model, pricing);
    }

    pub fn provider_name(&self) -> &'static str {
        self.config.provider.as_str()
    }

    /// Close the queue and remove the status file. Called once on graceful
    /// shutdown.
    pub fn shutdown(&self) {
        self.queue.close();
        self.beat.remove();
    }
}

fn tier_target(config: &Config, route: &TierRoute, prefixes: &[String]) -> ExecutionTarget {
    let adapter = Adapter::new(route.provider, config.provider_config(route.provider), prefixes)
        .with_overrides(route.api_key.clone(), route.base_url.clone());

    ExecutionTarget {
        adapter,
        model_override: route.model.clone(),
    }
}

fn fallback_target(config: &Config, fallback: &FallbackTarget, prefixes: &[String]) -> ExecutionTarget {
    let adapter = Adapter::new(fallback.provider, config.provider_config(fallback.provider), prefixes)
        .with_overrides(fallback.api_key.clone(), fallback.base_url.clone());

    ExecutionTarget {
        adapter,
        model_override: fallback.model.clone(),
    }
}

/// Serialize the request for one target: translated into the target's wire
/// shape, or forwarded as-is on the passthrough path.
fn build_plan(
    target: &ExecutionTarget,
    request: &MessagesRequest,
    target_model: &str,
    streaming: bool,
    raw_body: &Bytes,
) -> Result<DispatchPlan> {
    let adapter = target.adapter.clone();
    let shape = adapter.wire_shape(target_model);
    let url = adapter.endpoint_url(target_model);

    let (body, bridge) = match shape {
        WireShape::Messages => {
            // Forward the already-encoded body untouched unless the
            // effective model differs from the requested one.
            if request.model == target_model {
                (raw_body.clone(), None)
            } else {
                let mut renamed = request.clone();
                renamed.model = target_model.to_string();
                let body = serde_json::to_vec(&renamed).map_err(|e| GatewayError::Internal(e.to_string()))?;
                (Bytes::from(body), None)
            }
        }
        WireShape::Chat => {
            let chat = chat_translate::to_chat_request(request, target_model, streaming, adapter.supports_images());
            let body = serde_json::to_vec(&chat).map_err(|e| GatewayError::Internal(e.to_string()))?;
            (Bytes::from(body), None)
        }
        WireShape::Responses => {
            let mut bridge = CallIdBridge::default();
            let envelope = responses_translate::to_responses_request(request, target_model, streaming, &mut bridge);
            let body = serde_json::to_vec(&envelope).map_err(|e| GatewayError::Internal(e.to_string()))?;
            (Bytes::from(body), Some(bridge))
        }
    };

    Ok(DispatchPlan {
        adapter,
        url,
        body,
        shape,
        target_model: target_model.to_string(),
        bridge,
    })
}

/// Whether a status participates in the retry loop: 5xx except the long
/// overload signal.
fn retryable_status(status: StatusCode) -> bool {
    status.is_server_error() && status.as_u16() != OVERLOADED_STATUS
}

/// Forward an authoritative upstream error verbatim.
async fn forward_upstream(response: reqwest::Response) -> Result<Response> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    let body = response.bytes().await.unwrap_or_default();

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .map_err(|e| GatewayError::Internal(e.to_string()))
}

/// Terminal error after primary retries are exhausted and no fallback is
/// configured.
async fn primary_failure_error(response: Result<reqwest::Response>, provider: &str) -> GatewayError {
    match response {
        Ok(response) => {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            let detail = detail.chars().take(200).collect::<String>();

            GatewayError::Api(format!("upstream {provider} returned {status} after retries: {detail}"))
        }
        Err(e) => e,
    }
}

fn response_uses_tools(response: &MessagesResponse) -> bool {
    response
        .content
        .iter()
        .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T, headers: &[(&'static str, &'static str)]) -> Response {
    let body = serde_json::to_vec(body).unwrap_or_default();

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    builder.body(Body::from(body)).unwrap_or_else(|e| {
        log::error!("failed to build response: {e}");
        Response::new(Body::empty())
    })
}
