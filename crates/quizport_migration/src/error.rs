use std::fmt;

use quizport_canvas::TransportError;
use quizport_contract::ParseError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Http(u16),
    NoResponse,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Http(code) => write!(f, "HTTP {code}"),
            ResponseStatus::NoResponse => f.write_str("no response"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("{operation} rejected by remote service ({status}): {body}")]
    RemoteRejected {
        operation: &'static str,
        status: ResponseStatus,
        body: String,
    },
    #[error("malformed {operation} response: {detail}")]
    MalformedResponse {
        operation: &'static str,
        detail: String,
    },
    #[error("package upload rejected ({status}): {body}")]
    UploadRejected { status: ResponseStatus, body: String },
    #[error("package upload confirmation failed ({status}): {body}")]
    UploadConfirmationFailed { status: ResponseStatus, body: String },
    #[error("content migration failed: {payload}")]
    ImportFailed { payload: Value },
}

impl MigrationError {
    pub(crate) fn unreachable(operation: &'static str, error: TransportError) -> Self {
        MigrationError::RemoteRejected {
            operation,
            status: ResponseStatus::NoResponse,
            body: error.to_string(),
        }
    }

    pub(crate) fn malformed(operation: &'static str, error: ParseError) -> Self {
        MigrationError::MalformedResponse {
            operation,
            detail: error.to_string(),
        }
    }

    /// Whether a caller could reasonably try the whole import again later.
    ///
    /// Nothing inside the workflow retries; this only classifies.
    pub fn is_retryable_by_caller(&self) -> bool {
        match self {
            MigrationError::RemoteRejected { status, .. }
            | MigrationError::UploadRejected { status, .. }
            | MigrationError::UploadConfirmationFailed { status, .. } => match status {
                ResponseStatus::NoResponse => true,
                ResponseStatus::Http(code) => *code == 429 || *code >= 500,
            },
            MigrationError::MalformedResponse { .. } | MigrationError::ImportFailed { .. } => false,
        }
    }

    pub fn diagnostics(&self) -> Option<&Value> {
        match self {
            MigrationError::ImportFailed { payload } => Some(payload),
            _ => None,
        }
    }
}
