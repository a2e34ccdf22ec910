use std::{env, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    backend::{fetch, BackendError, ImageBackend},
    models::{ImagePayload, NormalizedGeneration, PollOutcome, SubmitOutcome},
};

const DEFAULT_BASE_URL: &str = "https://queue.imagegen.dev";

/// Two-phase provider: submit returns a job token immediately; the caller
/// polls with it until the queue reports done, at which point a second call
/// fetches the result payload.
#[derive(Clone)]
pub struct QueueAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueSubmitResponse {
    #[serde(default, rename = "requestId", alias = "id")]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueStatusResponse {
    #[serde(default)]
    done: bool,
    #[serde(default, rename = "queuePosition")]
    queue_position: u32,
    #[serde(default, rename = "waitTime")]
    wait_time: u32,
}

#[derive(Debug, Deserialize)]
struct QueueResultResponse {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    mime: Option<String>,
    #[serde(default, alias = "imageUrl")]
    url: Option<String>,
}

impl QueueAdapter {
    pub fn from_env() -> Result<Self, String> {
        let base_url = env::var("QUEUE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let api_key = env::var("QUEUE_API_KEY")
            .ok()
            .filter(|value| !value.is_empty());
        let timeout_secs = env::var("QUEUE_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(60);

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
            .map_err(|error| format!("failed to build queue HTTP client: {error}"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<T, BackendError> {
        let mut outbound = self.client.get(url);
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

        response
            .json()
            .await
            .map_err(|error| BackendError::InvalidResponse(error.to_string()))
    }
}

#[async_trait]
impl ImageBackend for QueueAdapter {
    fn name(&self) -> &str {
        "queue"
    }

    async fn submit(&self, request: NormalizedGeneration) -> Result<SubmitOutcome, BackendError> {
        let mut payload = json!({
            "prompt": request.prompt,
            "model": request.model,
        });
        if !request.models.is_empty() {
            payload["models"] = json!(request.models);
        }

        let mut outbound = self.client.post(self.url("/jobs")).json(&payload);
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

        let parsed: QueueSubmitResponse = response
            .json()
            .await
            .map_err(|error| BackendError::InvalidResponse(error.to_string()))?;

        let request_id = parsed
            .request_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                BackendError::InvalidResponse("missing job token in submit response".to_owned())
            })?;

        debug!(backend = self.name(), %request_id, "job submitted");
        Ok(SubmitOutcome::Submitted { request_id })
    }

    async fn poll(&self, request_id: &str) -> Result<PollOutcome, BackendError> {
        let status: QueueStatusResponse = self
            .get_json(self.url(&format!("/jobs/{request_id}/status")))
            .await?;

        if !status.done {
            return Ok(PollOutcome::Processing {
                queue_position: status.queue_position,
                wait_time: status.wait_time,
            });
        }

        let result: QueueResultResponse = self
            .get_json(self.url(&format!("/jobs/{request_id}/result")))
            .await?;

        let payload = if let Some(base64) = result.image.filter(|image| !image.is_empty()) {
            ImagePayload::Encoded {
                mime: result.mime.unwrap_or_else(|| "image/jpeg".to_owned()),
                base64,
            }
        } else if let Some(url) = result.url.filter(|url| !url.is_empty()) {
            ImagePayload::Remote { url }
        } else {
            return Err(BackendError::InvalidResponse(
                "completed job carried no image data".to_owned(),
            ));
        };

        let image_url = fetch::resolve_image_payload(&self.client, payload).await?;
        Ok(PollOutcome::Completed { image_url })
    }
}
