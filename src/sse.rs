use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const GENERIC_FAILURE: &str = "Image generation failed";

/// Terminal result extracted from one server-push event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { image_url: String },
    Failed { message: String },
    /// Stream ended without any terminal record.
    NoResult,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("stream transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Deserialize)]
struct StreamRecord {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "imageUrl")]
    image_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "queuePosition")]
    queue_position: Option<u32>,
    #[serde(default, rename = "waitTime")]
    wait_time: Option<u32>,
}

enum LineAction {
    Complete(String),
    Fail(String),
    Progress { queue_position: u32, wait_time: u32 },
    Nothing,
}

/// Consumes a chunked byte stream of newline-framed `data: ` records and
/// folds it into a terminal outcome.
///
/// Lines are only interpreted once fully delimited by a newline, so records
/// and multi-byte UTF-8 sequences split across chunk boundaries reassemble
/// correctly. Malformed or undecodable lines are skipped, not fatal. A
/// `complete` record with an image reference stops consumption immediately
/// unless an `error` record already arrived; error streams are drained so
/// the last (most specific) message wins.
pub async fn decode_terminal<S, B, E>(stream: S) -> Result<StreamOutcome, DecodeError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    futures_util::pin_mut!(stream);

    let mut buffer: Vec<u8> = Vec::new();
    let mut failure: Option<String> = None;

    while let Some(next) = stream.next().await {
        let chunk = next.map_err(|error| DecodeError::Transport(error.to_string()))?;
        buffer.extend_from_slice(chunk.as_ref());

        while let Some(index) = buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = buffer.drain(..=index).collect();
            match interpret_line(&line) {
                LineAction::Complete(image_url) => {
                    if failure.is_none() {
                        return Ok(StreamOutcome::Completed { image_url });
                    }
                }
                LineAction::Fail(message) => failure = Some(message),
                LineAction::Progress {
                    queue_position,
                    wait_time,
                } => {
                    debug!(queue_position, wait_time, "generation in progress");
                }
                LineAction::Nothing => {}
            }
        }
    }

    // The trailing fragment is complete once the stream ends.
    if !buffer.is_empty() {
        match interpret_line(&buffer) {
            LineAction::Complete(image_url) if failure.is_none() => {
                return Ok(StreamOutcome::Completed { image_url });
            }
            LineAction::Fail(message) => failure = Some(message),
            _ => {}
        }
    }

    Ok(match failure {
        Some(message) => StreamOutcome::Failed { message },
        None => StreamOutcome::NoResult,
    })
}

fn interpret_line(raw: &[u8]) -> LineAction {
    let Ok(line) = std::str::from_utf8(raw) else {
        return LineAction::Nothing;
    };
    let Some(payload) = line.trim().strip_prefix("data:") else {
        return LineAction::Nothing;
    };

    let record: StreamRecord = match serde_json::from_str(payload.trim()) {
        Ok(record) => record,
        Err(_) => return LineAction::Nothing,
    };

    match record.status.as_deref() {
        Some("complete") => match record.image_url.filter(|url| !url.is_empty()) {
            Some(image_url) => LineAction::Complete(image_url),
            // A complete record without an image reference is not a result.
            None => LineAction::Nothing,
        },
        Some("error") => LineAction::Fail(
            record
                .message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_owned()),
        ),
        Some("processing") => LineAction::Progress {
            queue_position: record.queue_position.unwrap_or_default(),
            wait_time: record.wait_time.unwrap_or_default(),
        },
        _ => LineAction::Nothing,
    }
}
