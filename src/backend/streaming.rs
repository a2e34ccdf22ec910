use std::{env, time::Duration};

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::{
    backend::{fetch, BackendError, ImageBackend},
    models::{NormalizedGeneration, SubmitOutcome},
    sse::{self, StreamOutcome},
};

const DEFAULT_BASE_URL: &str = "https://image.streamgen.dev";

/// Single-call provider: the submit response body is an event stream whose
/// terminal record carries the image reference.
#[derive(Clone)]
pub struct StreamingAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl StreamingAdapter {
    pub fn from_env() -> Result<Self, String> {
        let base_url = env::var("STREAMING_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let api_key = env::var("STREAMING_API_KEY")
            .ok()
            .filter(|value| !value.is_empty());
        let timeout_secs = env::var("STREAMING_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(120);

        Self::new(base_url, api_key, timeout_secs)
    }

    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| format!("failed to build streaming HTTP client: {error}"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ImageBackend for StreamingAdapter {
    fn name(&self) -> &str {
        "streaming"
    }

    async fn submit(&self, request: NormalizedGeneration) -> Result<SubmitOutcome, BackendError> {
        let mut payload = json!({
            "prompt": request.prompt,
            "model": request.model,
        });
        if !request.models.is_empty() {
            payload["models"] = json!(request.models);
        }

        let mut outbound = self
            .client
            .post(self.url("/generate"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&payload);
        if let Some(key) = &self.api_key {
            outbound = outbound.bearer_auth(key);
        }

        let response = outbound
            .send()
            .await
            .map_err(|error| BackendError::Unavailable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch::map_http_error(
                status,
                response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown backend error".to_owned()),
            ));
        }

        let outcome = sse::decode_terminal(response.bytes_stream())
            .await
            .map_err(|error| BackendError::Unavailable(error.to_string()))?;
        debug!(backend = self.name(), request_id = %request.request_id, "stream drained");

        match outcome {
            StreamOutcome::Completed { image_url } => {
                let image_url = fetch::resolve_image_reference(&self.client, &image_url).await?;
                Ok(SubmitOutcome::Completed { image_url })
            }
            StreamOutcome::Failed { message } => Err(BackendError::Generation(message)),
            StreamOutcome::NoResult => Err(BackendError::InvalidResponse(
                "no image URL received".to_owned(),
            )),
        }
    }
}
