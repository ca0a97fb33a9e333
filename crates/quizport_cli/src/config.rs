use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use quizport_canvas::CanvasConfig;
use quizport_contract::CourseId;
use quizport_migration::{ImportSettings, PollSettings};
use serde::Deserialize;

pub const TOKEN_ENV: &str = "CANVAS_API_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    pub canvas: CanvasSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub verification: VerificationSection,
}

#[derive(Clone, Deserialize)]
pub struct CanvasSection {
    pub base_url: String,
    pub course_id: Option<CourseId>,
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl fmt::Debug for CanvasSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasSection")
            .field("base_url", &self.base_url)
            .field("course_id", &self.course_id)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            budget_secs: default_budget_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSection {
    #[serde(default = "default_verify")]
    pub enabled: bool,
}

impl Default for VerificationSection {
    fn default() -> Self {
        Self {
            enabled: default_verify(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    2
}

fn default_budget_secs() -> u64 {
    300
}

fn default_verify() -> bool {
    true
}

impl RuntimeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("invalid config TOML at {}", path.display()))
    }

    pub fn parse(source: &str) -> Result<Self> {
        let config: RuntimeConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.canvas.base_url.trim().is_empty() {
            bail!("canvas.base_url must not be empty");
        }
        if self.polling.interval_secs == 0 {
            bail!("polling.interval_secs must be at least 1");
        }
        if self.canvas.request_timeout_secs == 0 {
            bail!("canvas.request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// The file's token wins over the environment.
    pub fn resolve_token(&self, from_env: Option<String>) -> Result<String> {
        [self.canvas.api_token.clone(), from_env]
            .into_iter()
            .flatten()
            .map(|token| token.trim().to_string())
            .find(|token| !token.is_empty())
            .ok_or_else(|| anyhow!("no Canvas API token: set canvas.api_token or {TOKEN_ENV}"))
    }

    pub fn course_id(&self, from_cli: Option<CourseId>) -> Result<CourseId> {
        from_cli
            .or(self.canvas.course_id)
            .ok_or_else(|| anyhow!("no course id: pass --course-id or set canvas.course_id"))
    }

    pub fn canvas_config(&self, api_token: String) -> CanvasConfig {
        CanvasConfig {
            base_url: self.canvas.base_url.clone(),
            api_token,
            request_timeout: Duration::from_secs(self.canvas.request_timeout_secs),
        }
    }

    pub fn import_settings(&self, budget_secs: Option<u64>, skip_verify: bool) -> ImportSettings {
        ImportSettings {
            poll: PollSettings {
                interval: Duration::from_secs(self.polling.interval_secs),
                budget: Duration::from_secs(budget_secs.unwrap_or(self.polling.budget_secs)),
            },
            verify: self.verification.enabled && !skip_verify,
        }
    }
}
