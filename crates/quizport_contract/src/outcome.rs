use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::migration::QuizId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<QuizId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Value>,
}

impl ImportOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Success, message.into())
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Warning, message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Error, message.into())
    }

    fn new(status: OutcomeStatus, message: String) -> Self {
        let message = if message.trim().is_empty() {
            match status {
                OutcomeStatus::Success => "import succeeded".to_string(),
                OutcomeStatus::Warning => "import finished with warnings".to_string(),
                OutcomeStatus::Error => "import failed".to_string(),
            }
        } else {
            message
        };

        Self {
            status,
            message,
            quiz_id: None,
            progress_url: None,
            diagnostics: None,
        }
    }

    pub fn with_quiz_id(mut self, quiz_id: QuizId) -> Self {
        self.quiz_id = Some(quiz_id);
        self
    }

    pub fn with_progress_url(mut self, progress_url: Option<String>) -> Self {
        self.progress_url = progress_url;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Value) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::{ImportOutcome, OutcomeStatus};
    use serde_json::json;

    #[test]
    fn blank_messages_are_replaced() {
        let outcome = ImportOutcome::error("   ");
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert_eq!(outcome.message, "import failed");
    }

    #[test]
    fn serializes_with_camel_case_and_skips_empty_fields() {
        let outcome = ImportOutcome::success("created quiz").with_quiz_id(77);
        let value = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(
            value,
            json!({ "status": "success", "message": "created quiz", "quizId": 77 })
        );
    }
}
