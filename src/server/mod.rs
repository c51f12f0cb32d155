//! HTTP boundary for the estimator.
//!
//! Thin plumbing around the core pipeline: decode a lenient request shape,
//! run resolution, rendering, appending, counting, and cost estimation in
//! sequence, then serialize a fully-populated result. Handlers never
//! surface an error for malformed input (bad fields degrade to defaults
//! exactly like the core does), so the only non-200 answers are the
//! optional secret check and axum's own method routing.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::ServerError;
use crate::output::{FORMAT_INSTRUCTIONS_MARKER, append_format_instructions};
use crate::pricing::{estimate_cost_usd, normalize_model, reasoning_multiplier};
use crate::registry::TemplateRegistry;
use crate::template::{RenderContext, render, value::stringify};
use crate::tokens::TokenCounter;

/// Maximum JSON body size (5 MB): serialized node outputs can be large.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Whole-request deadline. The core is CPU-bound and fast; this only
/// guards against slow clients.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Model assumed when neither the request nor the entry names one.
const DEFAULT_MODEL: &str = "gpt-5";

/// Shared read-only state: everything is built once at startup, handlers
/// only read.
pub struct AppState {
    pub registry: TemplateRegistry,
    pub counter: TokenCounter,
    /// Expected `x-webhook-secret` header value, if configured.
    pub webhook_secret: Option<String>,
}

/// Build the service router with state applied.
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/count", post(count_handler))
        .route("/estimate", post(estimate_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

/// The estimator's HTTP server.
///
/// `start()` binds the listener and spawns the serve task; `shutdown()`
/// signals graceful shutdown and waits for it to finish.
pub struct EstimatorServer {
    addr: std::net::SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl EstimatorServer {
    /// Create a server for the configured bind address.
    pub fn new(config: &Config) -> Self {
        Self {
            addr: config.addr(),
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Bind the listener and spawn the server task.
    pub async fn start(&mut self, app: Router) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::StartupFailed {
                reason: format!("failed to bind to {}: {}", self.addr, e),
            })?;

        tracing::info!("estimator listening on {}", self.addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                    tracing::info!("estimator shutting down");
                })
                .await
            {
                tracing::error!("server error: {}", e);
            }
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Signal graceful shutdown and wait for the server task to finish.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CountResponse {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateResponse {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
    prompt_chars: usize,
    completion_chars: usize,
    template_found: bool,
    resolved_key: Option<String>,
    prompt_source: &'static str,
    model: String,
    multiplier: f64,
    reasoning_multiplier: f64,
    cost_usd: f64,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { ok: true })
}

async fn count_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Some(denied) = check_secret(&state, &headers) {
        return denied;
    }

    let body = unwrap_body(&body);
    let model = field_str(&body, &["model"])
        .map(|m| normalize_model(m).to_string())
        .unwrap_or_default();

    let prompt = field_text(&body, &["prompt"]);
    let completion = field_text(&body, &["completion"]);

    let prompt_tokens = state.counter.count(&prompt, &model) as u64;
    let completion_tokens = state.counter.count(&completion, &model) as u64;

    Json(CountResponse {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    })
    .into_response()
}

async fn estimate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Some(denied) = check_secret(&state, &headers) {
        return denied;
    }

    let body = unwrap_body(&body);

    let key = field_str(&body, &["key", "promptKey"]);
    let workflow = field_str(&body, &["workflow", "workflowName"]);
    let node_name = field_str(&body, &["nodeName", "llmNodeName"]);

    let resolution = state.registry.resolve(key, workflow, node_name);
    let entry = resolution.entry;

    let prompt_override = field(
        &body,
        &["prompt", "promptTextForTokenizing", "prompt_text"],
    );
    let prompt_source = if prompt_override.is_some() {
        "override"
    } else if entry.is_some() {
        "template"
    } else {
        "missing"
    };

    let ctx = RenderContext::new()
        .with_vars(field_object(&body, &["vars"]))
        .with_json(field_object(&body, &["varsJson", "json"]))
        .with_nodes(field_object(&body, &["varsByNode"]));

    let mut prompt = match prompt_override {
        Some(value) => stringify(Some(value)),
        None => entry
            .map(|e| render(&e.template, &ctx))
            .unwrap_or_default(),
    };

    // LangChain injects format instructions at runtime, so the estimate
    // has to include them too. Skip when the caller's prompt already
    // carries the canonical preamble.
    if let Some(spec) = entry.and_then(|e| e.output_parser.as_ref()) {
        if !prompt.contains(FORMAT_INSTRUCTIONS_MARKER) {
            prompt = append_format_instructions(&prompt, spec);
        }
    }

    let completion = field_text(
        &body,
        &["completion", "completionTextForTokenizing", "completion_text"],
    );

    let model = field_str(&body, &["model"])
        .or_else(|| entry.and_then(|e| e.model.as_deref()))
        .unwrap_or(DEFAULT_MODEL);
    let model = normalize_model(model).to_string();

    let prompt_tokens_raw = state.counter.count(&prompt, &model);
    let completion_tokens_raw = state.counter.count(&completion, &model);

    let multiplier = sanitize_multiplier(
        field_number(&body, &["multiplier", "allowanceMultiplier"])
            .or_else(|| entry.map(|e| e.default_multiplier))
            .unwrap_or(1.0),
    );
    let reasoning = sanitize_multiplier(
        field_number(&body, &["reasoningMultiplier"])
            .unwrap_or_else(|| reasoning_multiplier(&model)),
    );

    let prompt_tokens = scale_tokens(prompt_tokens_raw, multiplier);
    let completion_tokens = scale_tokens(completion_tokens_raw, multiplier * reasoning);
    let cost_usd = estimate_cost_usd(&model, prompt_tokens, completion_tokens);

    tracing::debug!(
        resolved_key = ?resolution.resolved_key,
        prompt_source,
        prompt_tokens,
        completion_tokens,
        %model,
        "estimate"
    );

    Json(EstimateResponse {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
        prompt_chars: prompt.chars().count(),
        completion_chars: completion.chars().count(),
        template_found: entry.is_some(),
        resolved_key: resolution.resolved_key,
        prompt_source,
        model,
        multiplier,
        reasoning_multiplier: reasoning,
        cost_usd,
    })
    .into_response()
}

/// Validate the shared secret, if one is configured. Returns the 401
/// response to send on failure.
fn check_secret(state: &AppState, headers: &HeaderMap) -> Option<Response> {
    let expected = state.webhook_secret.as_deref()?;
    let provided = headers
        .get("x-webhook-secret")
        .and_then(|v| v.to_str().ok());
    if provided == Some(expected) {
        None
    } else {
        Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid or missing secret"})),
            )
                .into_response(),
        )
    }
}

/// Decode a request body into an object, tolerating every shape the
/// workflow tool is known to send: a JSON object, a JSON string wrapping
/// a JSON object, and the HTTP-Request-node envelope with a nested
/// `body` object. Anything else becomes an empty object.
fn unwrap_body(raw: &str) -> Value {
    let mut body: Value =
        serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(Map::new()));

    if let Value::String(inner) = &body {
        body = serde_json::from_str(inner).unwrap_or_else(|_| Value::Object(Map::new()));
    }

    if let Some(nested) = body.get("body").filter(|v| v.is_object()) {
        body = nested.clone();
    }

    if body.is_object() {
        body
    } else {
        Value::Object(Map::new())
    }
}

/// First present, non-null field among the accepted aliases.
fn field<'a>(body: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| body.get(*name))
        .find(|value| !value.is_null())
}

/// String-valued field; empty strings count as absent, like the
/// truthiness checks this layer replaces.
fn field_str<'a>(body: &'a Value, names: &[&str]) -> Option<&'a str> {
    field(body, names)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Object-valued field, defaulting to an empty scope.
fn field_object(body: &Value, names: &[&str]) -> Map<String, Value> {
    field(body, names)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Field coerced to text for tokenizing; absent becomes empty.
fn field_text(body: &Value, names: &[&str]) -> String {
    stringify(field(body, names))
}

/// Numeric field with loose coercion: numbers pass through, numeric
/// strings parse, anything else present coerces to NaN (which the
/// sanitizer maps to 1).
fn field_number(body: &Value, names: &[&str]) -> Option<f64> {
    let value = field(body, names)?;
    Some(match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => f64::NAN,
    })
}

/// Multipliers must be finite and non-zero; everything else means "no
/// adjustment".
fn sanitize_multiplier(value: f64) -> f64 {
    if value.is_finite() && value != 0.0 {
        value
    } else {
        1.0
    }
}

/// Apply a multiplier to a raw count, rounding and clamping at zero.
fn scale_tokens(raw: usize, factor: f64) -> u64 {
    let scaled = (raw as f64 * factor).round();
    if scaled.is_finite() && scaled > 0.0 {
        scaled as u64
    } else {
        0
    }
}
