use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    backend::{BackendError, ImageBackend},
    encoder,
    models::{NormalizedGeneration, PollOutcome, SubmitOutcome},
};

// PNG signature plus a little payload; enough to look like image bytes.
const SAMPLE_IMAGE: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];

const MOCK_JOB_TOKEN: &str = "abc123";

/// Deterministic in-process backend used when no provider is configured and
/// by the integration tests. One-shot by default; `two_phase` makes it hand
/// out a job token whose first poll reports processing and second completes.
#[derive(Debug, Default)]
pub struct MockBackend {
    two_phase: bool,
    polls: AtomicU32,
}

impl MockBackend {
    pub fn two_phase() -> Self {
        Self {
            two_phase: true,
            polls: AtomicU32::new(0),
        }
    }

    fn sample_data_uri() -> String {
        encoder::data_uri("image/png", SAMPLE_IMAGE)
    }
}

#[async_trait]
impl ImageBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, request: NormalizedGeneration) -> Result<SubmitOutcome, BackendError> {
        debug!(backend = self.name(), request_id = %request.request_id, prompt = %request.prompt, "mock submit");

        if self.two_phase {
            return Ok(SubmitOutcome::Submitted {
                request_id: MOCK_JOB_TOKEN.to_owned(),
            });
        }

        Ok(SubmitOutcome::Completed {
            image_url: Self::sample_data_uri(),
        })
    }

    async fn poll(&self, request_id: &str) -> Result<PollOutcome, BackendError> {
        if !self.two_phase {
            return Err(BackendError::poll_unsupported());
        }
        if request_id != MOCK_JOB_TOKEN {
            return Err(BackendError::InvalidResponse(
                "unknown job token".to_owned(),
            ));
        }

        let previous = self.polls.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            return Ok(PollOutcome::Processing {
                queue_position: 3,
                wait_time: 12,
            });
        }

        Ok(PollOutcome::Completed {
            image_url: Self::sample_data_uri(),
        })
    }
}
