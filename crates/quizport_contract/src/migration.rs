use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type CourseId = u64;
pub type QuizId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MigrationType {
    QtiConverter,
}

impl MigrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationType::QtiConverter => "qti_converter",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrationRequest {
    pub course_id: CourseId,
    pub file_name: String,
    pub migration_type: MigrationType,
}

impl MigrationRequest {
    pub fn qti_import(course_id: CourseId, file_name: impl Into<String>) -> Self {
        Self {
            course_id,
            file_name: file_name.into(),
            migration_type: MigrationType::QtiConverter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadTarget {
    pub upload_url: String,
    pub upload_params: BTreeMap<String, String>,
    pub progress_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    Queued,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl WorkflowState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => WorkflowState::Queued,
            "running" => WorkflowState::Running,
            "completed" => WorkflowState::Completed,
            "failed" => WorkflowState::Failed,
            other => WorkflowState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WorkflowState::Queued => "queued",
            WorkflowState::Running => "running",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
            WorkflowState::Other(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStatus {
    pub state: WorkflowState,
    /// Percent complete in `[0, 100]`, when the service reports one.
    pub completion: Option<f64>,
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizSummary {
    pub id: QuizId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
