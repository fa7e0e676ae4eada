//! Pulls the JSON payload out of free-form model output.
//!
//! The model wraps its answer in prose, so the payload is taken as the span from
//! the first `[` to the last `]`. There is no bracket balancing: stray brackets
//! in the surrounding text produce a parse error rather than a guess.

use crate::utils::error::{EtlError, Result};
use serde_json::Value;

/// Returns the parsed `[` .. `]` span of `response` as a list of values.
/// A span that parses to anything other than an array is wrapped in a
/// one-element list.
pub fn extract_json_array(response: &str) -> Result<Vec<Value>> {
    let span = bracket_span(response)?;
    tracing::debug!("Extracted JSON span of {} bytes", span.len());

    let value: Value = serde_json::from_str(span)
        .map_err(|e| EtlError::extraction(format!("invalid JSON between brackets: {}", e)))?;

    Ok(into_list(value))
}

// Spans from `bracket_span` always parse to arrays; other span finders may not.
fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn bracket_span(response: &str) -> Result<&str> {
    let start = response
        .find('[')
        .ok_or_else(|| EtlError::extraction("no '[' in model response"))?;

    match response.rfind(']') {
        Some(end) if end > start => Ok(&response[start..=end]),
        _ => Err(EtlError::extraction("no ']' after the first '['")),
    }
}
