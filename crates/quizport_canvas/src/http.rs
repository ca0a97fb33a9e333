use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use quizport_contract::{CourseId, MigrationRequest, UploadTarget};
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::{header, Client, RequestBuilder};
use tracing::debug;
use url::Url;

use crate::api::{CanvasApi, RemoteResponse, TransportError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const QUIZ_PAGE_SIZE: &str = "100";

#[derive(Clone)]
pub struct CanvasConfig {
    pub base_url: String,
    pub api_token: String,
    pub request_timeout: Duration,
}

impl CanvasConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for CanvasConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// reqwest-backed [`CanvasApi`]. Redirects are surfaced, never followed.
#[derive(Clone)]
pub struct HttpCanvasClient {
    client: Client,
    base_url: Url,
    api_token: String,
}

impl HttpCanvasClient {
    pub fn new(config: &CanvasConfig) -> Result<Self, TransportError> {
        let base_url = parse_base_url(&config.base_url)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("quizport/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::none())
            .build()
            .map_err(|e| TransportError::ClientSetup(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                reason: e.to_string(),
            })
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<RemoteResponse, TransportError> {
        let response = request.send().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: format!("failed reading body: {e}"),
        })?;

        debug!(url = %url, status, "remote response received");
        Ok(RemoteResponse {
            status,
            location,
            body,
        })
    }
}

impl fmt::Debug for HttpCanvasClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCanvasClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CanvasApi for HttpCanvasClient {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn create_migration(
        &self,
        request: &MigrationRequest,
    ) -> Result<RemoteResponse, TransportError> {
        let url = self.endpoint(&format!(
            "courses/{}/content_migrations",
            request.course_id
        ))?;
        let builder = self
            .client
            .post(url.clone())
            .bearer_auth(&self.api_token)
            .form(&[
                ("migration_type", request.migration_type.as_str()),
                ("pre_attachment[name]", request.file_name.as_str()),
            ]);
        self.send(url.as_str(), builder).await
    }

    async fn upload_package(
        &self,
        target: &UploadTarget,
        file_name: &str,
        package: Vec<u8>,
    ) -> Result<RemoteResponse, TransportError> {
        let mut form = Form::new();
        for (key, value) in &target.upload_params {
            form = form.text(key.clone(), value.clone());
        }
        // The storage backend expects the file as the final part.
        let file = Part::bytes(package)
            .file_name(file_name.to_string())
            .mime_str("application/zip")
            .map_err(|e| TransportError::ClientSetup(e.to_string()))?;
        form = form.part("file", file);

        let builder = self.client.post(&target.upload_url).multipart(form);
        self.send(&target.upload_url, builder).await
    }

    async fn get_authorized(&self, url: &Url) -> Result<RemoteResponse, TransportError> {
        let builder = self.client.get(url.clone()).bearer_auth(&self.api_token);
        self.send(url.as_str(), builder).await
    }

    async fn list_quizzes(&self, course_id: CourseId) -> Result<RemoteResponse, TransportError> {
        let url = self.endpoint(&format!("courses/{course_id}/quizzes"))?;
        let builder = self
            .client
            .get(url.clone())
            .bearer_auth(&self.api_token)
            .query(&[("per_page", QUIZ_PAGE_SIZE)]);
        self.send(url.as_str(), builder).await
    }
}

fn parse_base_url(raw: &str) -> Result<Url, TransportError> {
    let trimmed = raw.trim();
    // Without a trailing slash `join` would replace the last path segment.
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&normalized).map_err(|e| TransportError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TransportError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}
