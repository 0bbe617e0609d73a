//! Decoding of structured payloads out of raw model output.
//!
//! The model is asked to answer with a bare JSON array wrapped in a fenced
//! code block, but nothing enforces that: responses arrive with prose around
//! the fence, with arbitrary fence labels, or with no fence at all. This
//! module is the trust boundary between the model and the rest of the
//! pipeline — anything that does not parse into the expected shape is a
//! `DecodeError`, never a silent empty value.

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

const FENCE: &str = "```";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("model response is empty")]
    Empty,
    #[error("model response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Extract the JSON payload from a raw model response and parse it as `T`.
///
/// When a fenced block is present only its span is considered, so prose
/// before or after the fence is ignored. Without a fence the whole trimmed
/// text is parsed.
pub fn decode_payload<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    let payload = extract_payload(raw);
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    debug!("decoding {} bytes of model payload", payload.len());
    Ok(serde_json::from_str(payload)?)
}

/// Locate the span to parse: the contents of the first fenced block when one
/// exists, the whole trimmed text otherwise.
fn extract_payload(raw: &str) -> &str {
    let trimmed = raw.trim();

    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };

    // Skip the fence label (```json, ```JSON, anything) up to end of line.
    let after_open = &trimmed[open + FENCE.len()..];
    let body = match after_open.find('\n') {
        Some(eol) => &after_open[eol + 1..],
        // Opening fence with no newline after it; treat the rest as body.
        None => after_open,
    };

    // An unterminated fence still gets a parse attempt on what follows it,
    // so a truncated-but-complete payload is not lost.
    let body = match body.find(FENCE) {
        Some(close) => &body[..close],
        None => body,
    };

    body.trim()
}
