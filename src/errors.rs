use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::{backend::BackendError, envelope, models::ResultEnvelope};

/// Handler-level failures. Unlike a conventional API, these never become
/// non-200 responses: the external contract is that failures are data.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    ClientInput(String),
    #[error("{provider}: {source}")]
    Backend {
        provider: String,
        source: BackendError,
    },
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn into_envelope(self) -> ResultEnvelope {
        match self {
            AppError::ClientInput(message) => ResultEnvelope::error(message),
            AppError::Backend { provider, source } => {
                ResultEnvelope::error(format!("{provider}: {source}"))
            }
            AppError::Internal(message) => {
                ResultEnvelope::error_with_details("Internal server error", message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        envelope::json_response(self.into_envelope())
    }
}
