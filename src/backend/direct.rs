use std::{env, time::Duration};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use tracing::debug;

use crate::{
    backend::{fetch, BackendError, ImageBackend},
    encoder,
    models::{NormalizedGeneration, SubmitOutcome},
};

const DEFAULT_BASE_URL: &str = "https://inference.imagegen.dev";

// Fixed generation parameters for the managed inference endpoint.
const NUM_STEPS: u32 = 4;
const GUIDANCE: f32 = 7.5;

/// Managed inference provider: one call, raw image bytes back.
#[derive(Clone)]
pub struct DirectAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl DirectAdapter {
    pub fn from_env() -> Result<Self, String> {
        let base_url = env::var("DIRECT_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let api_key = env::var("DIRECT_API_KEY")
            .ok()
            .filter(|value| !value.is_empty());
        let timeout_secs = env::var("DIRECT_TIMEOUT_SECS")
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
            .map_err(|error| format!("failed to build direct-inference HTTP client: {error}"))?;

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
impl ImageBackend for DirectAdapter {
    fn name(&self) -> &str {
        "direct"
    }

    async fn submit(&self, request: NormalizedGeneration) -> Result<SubmitOutcome, BackendError> {
        let mut payload = json!({
            "prompt": request.prompt,
            "model": request.model,
            "num_steps": NUM_STEPS,
            "guidance": GUIDANCE,
        });
        if !request.models.is_empty() {
            payload["models"] = json!(request.models);
        }

        let mut outbound = self.client.post(self.url("/run")).json(&payload);
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

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_owned())
            .unwrap_or_default();
        if !mime.starts_with("image/") {
            return Err(BackendError::InvalidResponse(format!(
                "expected image bytes, got content type {mime:?}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| BackendError::Unavailable(error.to_string()))?;
        debug!(
            backend = self.name(),
            request_id = %request.request_id,
            bytes = bytes.len(),
            "inference returned image"
        );

        Ok(SubmitOutcome::Completed {
            image_url: encoder::data_uri(&mime, &bytes),
        })
    }
}
