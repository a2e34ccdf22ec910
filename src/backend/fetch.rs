use reqwest::{header::CONTENT_TYPE, StatusCode};

use crate::{backend::BackendError, encoder, models::ImagePayload};

/// Upstream bodies echoed into error messages are capped so a misbehaving
/// backend cannot balloon the envelope.
pub(crate) fn truncate_detail(body: &str) -> String {
    body.chars().take(400).collect()
}

pub(crate) fn map_http_error(status: StatusCode, body: String) -> BackendError {
    let trimmed = truncate_detail(&body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            BackendError::Unavailable(format!("rate limited: {trimmed}"))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            BackendError::Timeout(format!("upstream timeout: {trimmed}"))
        }
        _ => BackendError::InvalidResponse(format!("status {}: {trimmed}", status.as_u16())),
    }
}

/// GETs a remote image and re-packages its bytes as a `data:` URI. The
/// response must carry an `image/*` content type.
pub(crate) async fn fetch_image_as_data_uri(
    client: &reqwest::Client,
    url: &str,
) -> Result<String, BackendError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| BackendError::Unavailable(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(map_http_error(
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
            "expected an image from {url}, got content type {mime:?}"
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|error| BackendError::Unavailable(error.to_string()))?;

    Ok(encoder::data_uri(&mime, &bytes))
}

/// A `data:` URI passes through untouched; anything else is treated as a
/// remote reference and fetched.
pub(crate) async fn resolve_image_reference(
    client: &reqwest::Client,
    reference: &str,
) -> Result<String, BackendError> {
    if reference.starts_with("data:") {
        return Ok(reference.to_owned());
    }
    fetch_image_as_data_uri(client, reference).await
}

/// Normalizes any of the three image payload forms into one self-contained
/// `data:` URI.
pub(crate) async fn resolve_image_payload(
    client: &reqwest::Client,
    payload: ImagePayload,
) -> Result<String, BackendError> {
    match payload {
        ImagePayload::Inline { mime, bytes } => Ok(encoder::data_uri(&mime, &bytes)),
        ImagePayload::Encoded { mime, base64 } => {
            if base64.starts_with("data:") {
                Ok(base64)
            } else {
                Ok(format!("data:{mime};base64,{base64}"))
            }
        }
        ImagePayload::Remote { url } => resolve_image_reference(client, &url).await,
    }
}
