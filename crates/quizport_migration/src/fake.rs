use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use quizport_canvas::{CanvasApi, RemoteResponse, TransportError};
use quizport_contract::{CourseId, MigrationRequest, UploadTarget};
use serde_json::Value;
use url::Url;

pub const BASE_URL: &str = "https://canvas.test/api/v1/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateMigration { course_id: CourseId, file_name: String },
    Upload { upload_url: String, file_name: String, size: usize },
    Get(String),
    ListQuizzes(CourseId),
}

type Script = VecDeque<Result<RemoteResponse, TransportError>>;

/// In-memory [`CanvasApi`] that replays scripted replies per endpoint.
///
/// The last reply of each script repeats once the others are used up.
pub struct ScriptedCanvas {
    base_url: Url,
    create: Mutex<Script>,
    upload: Mutex<Script>,
    gets: Mutex<HashMap<String, Script>>,
    quizzes: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
    get_latency: Duration,
}

impl ScriptedCanvas {
    pub fn new() -> Self {
        Self {
            base_url: Url::parse(BASE_URL).expect("fake base url"),
            create: Mutex::new(VecDeque::new()),
            upload: Mutex::new(VecDeque::new()),
            gets: Mutex::new(HashMap::new()),
            quizzes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            get_latency: Duration::ZERO,
        }
    }

    pub fn on_create(self, reply: Result<RemoteResponse, TransportError>) -> Self {
        self.create.lock().expect("lock").push_back(reply);
        self
    }

    pub fn on_upload(self, reply: Result<RemoteResponse, TransportError>) -> Self {
        self.upload.lock().expect("lock").push_back(reply);
        self
    }

    pub fn on_get(self, url: &str, replies: Vec<Result<RemoteResponse, TransportError>>) -> Self {
        self.gets
            .lock()
            .expect("lock")
            .entry(url.to_string())
            .or_default()
            .extend(replies);
        self
    }

    /// Every GET waits this long before replying.
    pub fn with_get_latency(mut self, latency: Duration) -> Self {
        self.get_latency = latency;
        self
    }

    pub fn on_quizzes(self, reply: Result<RemoteResponse, TransportError>) -> Self {
        self.quizzes.lock().expect("lock").push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn get_count(&self, url: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Get(target) if target == url))
            .count()
    }

    pub fn upload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Upload { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("lock").push(call);
    }
}

fn next(script: &mut Script, what: &str) -> Result<RemoteResponse, TransportError> {
    if script.len() > 1 {
        return script.pop_front().expect("non-empty script");
    }
    script.front().cloned().unwrap_or_else(|| {
        Err(TransportError::Request {
            url: what.to_string(),
            reason: "no scripted reply".to_string(),
        })
    })
}

pub fn json_reply(status: u16, body: Value) -> Result<RemoteResponse, TransportError> {
    Ok(RemoteResponse::new(status, body.to_string()))
}

pub fn text_reply(status: u16, body: &str) -> Result<RemoteResponse, TransportError> {
    Ok(RemoteResponse::new(status, body))
}

pub fn redirect_reply(status: u16, location: &str) -> Result<RemoteResponse, TransportError> {
    Ok(RemoteResponse::redirect(status, location))
}

pub fn unreachable(url: &str) -> Result<RemoteResponse, TransportError> {
    Err(TransportError::Request {
        url: url.to_string(),
        reason: "connection refused".to_string(),
    })
}

#[async_trait]
impl CanvasApi for ScriptedCanvas {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn create_migration(
        &self,
        request: &MigrationRequest,
    ) -> Result<RemoteResponse, TransportError> {
        self.record(Call::CreateMigration {
            course_id: request.course_id,
            file_name: request.file_name.clone(),
        });
        next(&mut self.create.lock().expect("lock"), "create_migration")
    }

    async fn upload_package(
        &self,
        target: &UploadTarget,
        file_name: &str,
        package: Vec<u8>,
    ) -> Result<RemoteResponse, TransportError> {
        self.record(Call::Upload {
            upload_url: target.upload_url.clone(),
            file_name: file_name.to_string(),
            size: package.len(),
        });
        next(&mut self.upload.lock().expect("lock"), &target.upload_url)
    }

    async fn get_authorized(&self, url: &Url) -> Result<RemoteResponse, TransportError> {
        self.record(Call::Get(url.to_string()));
        if !self.get_latency.is_zero() {
            tokio::time::sleep(self.get_latency).await;
        }
        let mut gets = self.gets.lock().expect("lock");
        let script = gets.entry(url.to_string()).or_default();
        next(script, url.as_str())
    }

    async fn list_quizzes(&self, course_id: CourseId) -> Result<RemoteResponse, TransportError> {
        self.record(Call::ListQuizzes(course_id));
        next(&mut self.quizzes.lock().expect("lock"), "list_quizzes")
    }
}
