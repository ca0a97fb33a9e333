use async_trait::async_trait;
use quizport_contract::{CourseId, MigrationRequest, UploadTarget};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            location: None,
            body: body.into(),
        }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            location: Some(location.into()),
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302)
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("http client setup failed: {0}")]
    ClientSetup(String),
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

/// The remote course service as seen by the import workflow.
///
/// Implementations attach the bearer credential to every call except
/// `upload_package`, which targets a pre-authorized upload slot.
#[async_trait]
pub trait CanvasApi: Send + Sync {
    /// Base that relative progress references are resolved against.
    fn base_url(&self) -> &Url;

    async fn create_migration(
        &self,
        request: &MigrationRequest,
    ) -> Result<RemoteResponse, TransportError>;

    async fn upload_package(
        &self,
        target: &UploadTarget,
        file_name: &str,
        package: Vec<u8>,
    ) -> Result<RemoteResponse, TransportError>;

    async fn get_authorized(&self, url: &Url) -> Result<RemoteResponse, TransportError>;

    async fn list_quizzes(&self, course_id: CourseId) -> Result<RemoteResponse, TransportError>;
}
