pub mod direct;
pub mod fetch;
pub mod mock;
pub mod multi;
pub mod queue;
pub mod streaming;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NormalizedGeneration, PollOutcome, SubmitOutcome};

/// One text-to-image provider. `submit` always exists; only two-phase queue
/// providers override `poll`.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, request: NormalizedGeneration) -> Result<SubmitOutcome, BackendError>;

    async fn poll(&self, _request_id: &str) -> Result<PollOutcome, BackendError> {
        Err(BackendError::poll_unsupported())
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend timeout: {0}")]
    Timeout(String),
    #[error("backend invalid response: {0}")]
    InvalidResponse(String),
    /// Failure reported by the backend itself, passed through verbatim.
    #[error("{0}")]
    Generation(String),
}

impl BackendError {
    pub fn poll_unsupported() -> Self {
        Self::InvalidResponse("backend does not support status polling".to_owned())
    }
}
