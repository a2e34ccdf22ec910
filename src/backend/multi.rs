use std::{env, time::Duration};

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    backend::{fetch, BackendError, ImageBackend},
    encoder,
    models::{ImagePayload, NormalizedGeneration, SubmitOutcome},
};

/// Best-effort provider: a fixed ordered list of candidate endpoints.
/// Advances to the next candidate only on 404; any other failure surfaces
/// immediately. Never loops back.
#[derive(Clone)]
pub struct MultiEndpointAdapter {
    client: reqwest::Client,
    endpoints: Vec<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateResponse {
    #[serde(default, rename = "imageUrl", alias = "url")]
    image_url: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    mime: Option<String>,
}

impl MultiEndpointAdapter {
    pub fn from_env() -> Result<Self, String> {
        let endpoints = env::var("MULTI_ENDPOINTS")
            .map_err(|_| "MULTI_ENDPOINTS must list candidate URLs (comma separated)".to_owned())?
            .split(',')
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .map(ToOwned::to_owned)
            .collect::<Vec<_>>();
        let api_key = env::var("MULTI_API_KEY")
            .ok()
            .filter(|value| !value.is_empty());
        let timeout_secs = env::var("MULTI_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(60);

        Self::new(endpoints, api_key, timeout_secs)
    }

    pub fn new(
        endpoints: Vec<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, String> {
        if endpoints.is_empty() {
            return Err("at least one candidate endpoint is required".to_owned());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| format!("failed to build multi-endpoint HTTP client: {error}"))?;

        Ok(Self {
            client,
            endpoints,
            api_key,
        })
    }
}

#[async_trait]
impl ImageBackend for MultiEndpointAdapter {
    fn name(&self) -> &str {
        "multi-endpoint"
    }

    async fn submit(&self, request: NormalizedGeneration) -> Result<SubmitOutcome, BackendError> {
        let mut payload = json!({
            "prompt": request.prompt,
            "model": request.model,
        });
        if !request.models.is_empty() {
            payload["models"] = json!(request.models);
        }

        for endpoint in &self.endpoints {
            let mut outbound = self.client.post(endpoint).json(&payload);
            if let Some(key) = &self.api_key {
                outbound = outbound.bearer_auth(key);
            }

            let response = outbound
                .send()
                .await
                .map_err(|error| BackendError::Unavailable(error.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                warn!(backend = self.name(), endpoint = %endpoint, "candidate not found, advancing");
                continue;
            }
            if !status.is_success() {
                return Err(fetch::map_http_error(
                    status,
                    response
                        .text()
                        .await
                        .unwrap_or_else(|_| "unknown backend error".to_owned()),
                ));
            }

            debug!(backend = self.name(), endpoint = %endpoint, "candidate answered");
            return self.extract_image(response).await;
        }

        Err(BackendError::Unavailable(
            "all candidate endpoints returned not found".to_owned(),
        ))
    }
}

impl MultiEndpointAdapter {
    async fn extract_image(
        &self,
        response: reqwest::Response,
    ) -> Result<SubmitOutcome, BackendError> {
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_owned())
            .unwrap_or_default();

        // Some candidates answer with raw image bytes, others with JSON.
        if mime.starts_with("image/") {
            let bytes = response
                .bytes()
                .await
                .map_err(|error| BackendError::Unavailable(error.to_string()))?;
            return Ok(SubmitOutcome::Completed {
                image_url: encoder::data_uri(&mime, &bytes),
            });
        }

        let parsed: CandidateResponse = response
            .json()
            .await
            .map_err(|error| BackendError::InvalidResponse(error.to_string()))?;

        let payload = if let Some(base64) = parsed.image.filter(|image| !image.is_empty()) {
            ImagePayload::Encoded {
                mime: parsed.mime.unwrap_or_else(|| "image/jpeg".to_owned()),
                base64,
            }
        } else if let Some(url) = parsed.image_url.filter(|url| !url.is_empty()) {
            ImagePayload::Remote { url }
        } else {
            return Err(BackendError::InvalidResponse(
                "candidate response carried no image data".to_owned(),
            ));
        };

        let image_url = fetch::resolve_image_payload(&self.client, payload).await?;
        Ok(SubmitOutcome::Completed { image_url })
    }
}
