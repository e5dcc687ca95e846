//! Decoding of untrusted model output.

use super::{ExtractionError, ExtractionResult};
use crate::model::company_group::CompanyGroup;
use serde_json::Value;

/// Decodes the JSON text produced by the model into company groups.
///
/// Accepts a top-level array or a single group object, optionally wrapped in
/// a markdown code fence.
pub fn parse_groups_payload(text: &str) -> ExtractionResult<Vec<CompanyGroup>> {
    let body = strip_code_fence(text.trim());
    let value: Value = serde_json::from_str(body)
        .map_err(|err| ExtractionError::MalformedResponse(err.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        Value::Null => Vec::new(),
        other => {
            return Err(ExtractionError::MalformedResponse(format!(
                "expected an array of groups, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .filter(|item| !item.is_null())
        .map(|item| {
            serde_json::from_value::<CompanyGroup>(item)
                .map(|mut group| {
                    group.id = None;
                    group
                })
                .map_err(|err| ExtractionError::MalformedResponse(err.to_string()))
        })
        .collect()
}

/// Unwraps a `generateContent` response body.
///
/// Error envelopes surface their `error.message`; successful envelopes are
/// decoded from the first candidate's first text part.
pub fn parse_generate_response(body: &str) -> ExtractionResult<Vec<CompanyGroup>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| ExtractionError::MalformedResponse(err.to_string()))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        return Err(ExtractionError::Api(message.replace(['\n', '\r'], " ")));
    }

    let text = value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ExtractionError::MalformedResponse("response has no candidate text".to_string())
        })?;
    parse_groups_payload(text)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
