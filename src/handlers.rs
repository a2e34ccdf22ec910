use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use crate::{
    envelope,
    errors::AppError,
    models::{GenerateRequest, PollQuery, ResultEnvelope},
    state::AppState,
};

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(error) => AppError::Internal(format!("metrics render failed: {error}")).into_response(),
    }
}

pub async fn preflight() -> Response {
    envelope::preflight()
}

pub async fn method_not_allowed() -> Response {
    envelope::method_not_allowed()
}

/// POST /: submit a generation request. Every outcome, including body parse
/// failures, leaves as a 200 envelope.
pub async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    let started = Instant::now();
    let _inflight = state.metrics.inflight_guard();

    let outcome = process_generate(&state, body).await;
    let response = envelope::json_response(outcome.unwrap_or_else(AppError::into_envelope));

    state
        .metrics
        .observe_request("/", "POST", response.status().as_u16(), started.elapsed());
    response
}

/// GET /?requestId=…: poll a two-phase job.
pub async fn poll(State(state): State<AppState>, Query(query): Query<PollQuery>) -> Response {
    let started = Instant::now();
    let _inflight = state.metrics.inflight_guard();

    let outcome = process_poll(&state, query).await;
    let response = envelope::json_response(outcome.unwrap_or_else(AppError::into_envelope));

    state
        .metrics
        .observe_request("/", "GET", response.status().as_u16(), started.elapsed());
    response
}

async fn process_generate(state: &AppState, body: Bytes) -> Result<ResultEnvelope, AppError> {
    let request: GenerateRequest = serde_json::from_slice(&body)
        .map_err(|error| AppError::ClientInput(format!("Invalid JSON body: {error}")))?;
    let normalized = request.into_normalized().map_err(AppError::ClientInput)?;

    info!(
        request_id = %normalized.request_id,
        model = %normalized.model,
        provider = state.backend.name(),
        "generation request accepted"
    );

    let provider = state.backend.name().to_owned();
    let outcome = state
        .backend
        .submit(normalized)
        .await
        .map_err(|source| {
            state.metrics.observe_backend_error("submit");
            warn!(provider = %provider, error = %source, "submit failed");
            AppError::Backend {
                provider: provider.clone(),
                source,
            }
        })?;

    Ok(ResultEnvelope::from_submit(outcome, &provider))
}

async fn process_poll(state: &AppState, query: PollQuery) -> Result<ResultEnvelope, AppError> {
    let request_id = query
        .request_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AppError::ClientInput("requestId query parameter is required".to_owned())
        })?
        .to_owned();

    info!(%request_id, provider = state.backend.name(), "status poll");

    let provider = state.backend.name().to_owned();
    let outcome = state.backend.poll(&request_id).await.map_err(|source| {
        state.metrics.observe_backend_error("poll");
        warn!(provider = %provider, %request_id, error = %source, "poll failed");
        AppError::Backend {
            provider: provider.clone(),
            source,
        }
    })?;

    Ok(ResultEnvelope::from_poll(outcome, &provider))
}
