use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::migration::{MigrationStatus, QuizSummary, UploadTarget, WorkflowState};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("response is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("response field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Never returns a partially populated target.
pub fn parse_upload_target(body: &str) -> Result<UploadTarget, ParseError> {
    let value: Value = serde_json::from_str(body).map_err(ParseError::InvalidJson)?;

    let root = value
        .as_object()
        .ok_or(ParseError::MissingField("pre_attachment"))?;
    let pre_attachment = root
        .get("pre_attachment")
        .and_then(Value::as_object)
        .ok_or(ParseError::MissingField("pre_attachment"))?;

    let upload_url = required_str(pre_attachment, "upload_url", "pre_attachment.upload_url")?;
    let raw_params = pre_attachment
        .get("upload_params")
        .and_then(Value::as_object)
        .ok_or(ParseError::MissingField("pre_attachment.upload_params"))?;
    let upload_params = flatten_params(raw_params)?;

    let progress_url = required_str(root, "progress_url", "progress_url")?;

    Ok(UploadTarget {
        upload_url,
        upload_params,
        progress_url,
    })
}

/// Reads a progress resource. `completion` is clamped to `[0, 100]`; a
/// non-numeric value is treated as absent.
pub fn parse_migration_status(body: &str) -> Result<MigrationStatus, ParseError> {
    let raw: Value = serde_json::from_str(body).map_err(ParseError::InvalidJson)?;

    let state = raw
        .get("workflow_state")
        .and_then(Value::as_str)
        .map(WorkflowState::parse)
        .ok_or(ParseError::MissingField("workflow_state"))?;

    let completion = raw
        .get("completion")
        .and_then(Value::as_f64)
        .map(|percent| percent.clamp(0.0, 100.0));

    Ok(MigrationStatus {
        state,
        completion,
        raw,
    })
}

pub fn parse_quiz_list(body: &str) -> Result<Vec<QuizSummary>, ParseError> {
    serde_json::from_str(body).map_err(ParseError::InvalidJson)
}

fn required_str(
    object: &Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<String, ParseError> {
    match object.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        Some(Value::String(_)) => Err(ParseError::InvalidField {
            field,
            reason: "empty string".to_string(),
        }),
        Some(Value::Null) | None => Err(ParseError::MissingField(field)),
        Some(other) => Err(ParseError::InvalidField {
            field,
            reason: format!("expected string, got {other}"),
        }),
    }
}

// Null-valued params are dropped rather than sent as empty fields.
fn flatten_params(raw: &Map<String, Value>) -> Result<BTreeMap<String, String>, ParseError> {
    let mut params = BTreeMap::new();
    for (key, item) in raw {
        let text = match item {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Null => continue,
            Value::Array(_) | Value::Object(_) => {
                return Err(ParseError::InvalidField {
                    field: "pre_attachment.upload_params",
                    reason: format!("param `{key}` is not a scalar"),
                })
            }
        };
        params.insert(key.clone(), text);
    }
    Ok(params)
}
