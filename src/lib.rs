pub mod backend;
pub mod encoder;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod sse;
pub mod state;

use std::{env, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use backend::{
    direct::DirectAdapter, mock::MockBackend, multi::MultiEndpointAdapter, queue::QueueAdapter,
    streaming::StreamingAdapter, ImageBackend,
};
use tracing::info;

pub fn build_state() -> Result<state::AppState, std::io::Error> {
    let backend = backend_from_env().map_err(std::io::Error::other)?;
    info!(backend = backend.name(), "image backend configured");
    Ok(state::AppState::new(backend))
}

fn backend_from_env() -> Result<Arc<dyn ImageBackend>, String> {
    let provider = env::var("IMAGE_PROVIDER")
        .ok()
        .filter(|value| !value.is_empty());
    match provider.as_deref() {
        Some("stream") => Ok(Arc::new(StreamingAdapter::from_env()?)),
        Some("queue") => Ok(Arc::new(QueueAdapter::from_env()?)),
        Some("direct") => Ok(Arc::new(DirectAdapter::from_env()?)),
        Some("multi") => Ok(Arc::new(MultiEndpointAdapter::from_env()?)),
        Some(other) => Err(format!(
            "unknown IMAGE_PROVIDER {other:?} (expected stream, queue, direct or multi)"
        )),
        None => Ok(Arc::new(MockBackend::default())),
    }
}

pub fn build_app(state: state::AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/",
            post(handlers::generate)
                .get(handlers::poll)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .with_state(state)
}
