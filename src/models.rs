use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MODEL: &str = "turbo";

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Ordered preference list; forwarded verbatim, first-available selection
    /// is the backend's job.
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NormalizedGeneration {
    pub request_id: String,
    pub prompt: String,
    pub model: String,
    pub models: Vec<String>,
}

impl GenerateRequest {
    pub fn into_normalized(self) -> Result<NormalizedGeneration, String> {
        let prompt = self
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .ok_or_else(|| "Prompt is required".to_owned())?
            .to_owned();

        let model = self
            .model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_owned();

        Ok(NormalizedGeneration {
            request_id: format!("gen_{}", Uuid::new_v4()),
            prompt,
            model,
            models: self.models,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollQuery {
    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
}

/// The three shapes image data arrives in from a backend. All of them are
/// normalized to a self-contained `data:` URI before leaving the proxy.
#[derive(Debug, Clone)]
pub enum ImagePayload {
    Inline { mime: String, bytes: Vec<u8> },
    /// Already base64 text, or a full `data:` URI.
    Encoded { mime: String, base64: String },
    Remote { url: String },
}

/// What a backend hands back from `submit`: either an immediately finished
/// image or a job token the caller polls with later.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Submitted { request_id: String },
    Completed { image_url: String },
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    Processing { queue_position: u32, wait_time: u32 },
    Completed { image_url: String },
}

/// The uniform outbound JSON shape. Exactly one of these four forms leaves
/// the proxy, always under a 200 transport status.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResultEnvelope {
    Completed {
        #[serde(rename = "imageUrl")]
        image_url: String,
        provider: String,
        status: &'static str,
    },
    Submitted {
        #[serde(rename = "requestId")]
        request_id: String,
        provider: String,
        status: &'static str,
    },
    Processing {
        status: &'static str,
        #[serde(rename = "queuePosition")]
        queue_position: u32,
        #[serde(rename = "waitTime")]
        wait_time: u32,
        done: bool,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        status: &'static str,
    },
}

impl ResultEnvelope {
    pub fn completed(image_url: String, provider: &str) -> Self {
        Self::Completed {
            image_url,
            provider: provider.to_owned(),
            status: "completed",
        }
    }

    pub fn submitted(request_id: String, provider: &str) -> Self {
        Self::Submitted {
            request_id,
            provider: provider.to_owned(),
            status: "submitted",
        }
    }

    pub fn processing(queue_position: u32, wait_time: u32) -> Self {
        Self::Processing {
            status: "processing",
            queue_position,
            wait_time,
            done: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
            details: None,
            status: "error",
        }
    }

    pub fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
            details: Some(details.into()),
            status: "error",
        }
    }

    pub fn from_submit(outcome: SubmitOutcome, provider: &str) -> Self {
        match outcome {
            SubmitOutcome::Submitted { request_id } => Self::submitted(request_id, provider),
            SubmitOutcome::Completed { image_url } => Self::completed(image_url, provider),
        }
    }

    pub fn from_poll(outcome: PollOutcome, provider: &str) -> Self {
        match outcome {
            PollOutcome::Processing {
                queue_position,
                wait_time,
            } => Self::processing(queue_position, wait_time),
            PollOutcome::Completed { image_url } => Self::completed(image_url, provider),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_rejects_missing_prompt() {
        let request = GenerateRequest {
            prompt: None,
            model: None,
            models: vec![],
        };

        let error = request
            .into_normalized()
            .expect_err("missing prompt should fail");
        assert_eq!(error, "Prompt is required");
    }

    #[test]
    fn normalization_rejects_whitespace_prompt() {
        let request = GenerateRequest {
            prompt: Some("   \n\t ".to_owned()),
            model: None,
            models: vec![],
        };

        assert!(request.into_normalized().is_err());
    }

    #[test]
    fn normalization_trims_and_defaults_model() {
        let request = GenerateRequest {
            prompt: Some("  a red fox  ".to_owned()),
            model: None,
            models: vec![],
        };

        let normalized = request.into_normalized().expect("valid prompt");
        assert_eq!(normalized.prompt, "a red fox");
        assert_eq!(normalized.model, DEFAULT_MODEL);
    }

    #[test]
    fn envelope_serializes_wire_names() {
        let envelope = ResultEnvelope::completed("data:image/png;base64,AA==".to_owned(), "mock");
        let json = serde_json::to_value(&envelope).expect("serializable");
        assert_eq!(json["imageUrl"], "data:image/png;base64,AA==");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["provider"], "mock");
    }

    #[test]
    fn processing_envelope_reports_not_done() {
        let envelope = ResultEnvelope::processing(3, 12);
        let json = serde_json::to_value(&envelope).expect("serializable");
        assert_eq!(json["queuePosition"], 3);
        assert_eq!(json["waitTime"], 12);
        assert_eq!(json["done"], false);
    }

    #[test]
    fn error_envelope_omits_absent_details() {
        let envelope = ResultEnvelope::error("boom");
        let json = serde_json::to_value(&envelope).expect("serializable");
        assert!(json.get("details").is_none());
        assert_eq!(json["status"], "error");
    }
}
