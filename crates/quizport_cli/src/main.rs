mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use quizport_canvas::HttpCanvasClient;
use quizport_contract::{CourseId, ImportOutcome, MigrationRequest};
use quizport_migration::{list_quizzes, ImportOrchestrator};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{RuntimeConfig, TOKEN_ENV};

#[derive(Debug, Parser)]
#[command(author, version, about = "Imports generated QTI quiz packages into Canvas courses")]
struct Cli {
    #[arg(long, global = true, default_value = "config/quizport.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a QTI package and wait for the course import to finish.
    Import {
        #[arg(long)]
        package: PathBuf,
        #[arg(long)]
        course_id: Option<CourseId>,
        /// Name announced to Canvas; defaults to the package's file name.
        #[arg(long)]
        file_name: Option<String>,
        #[arg(long)]
        budget_secs: Option<u64>,
        #[arg(long)]
        no_verify: bool,
    },
    /// Keep polling a migration that an earlier import left running.
    Progress {
        #[arg(long)]
        progress_url: String,
        #[arg(long)]
        course_id: Option<CourseId>,
        #[arg(long)]
        budget_secs: Option<u64>,
        #[arg(long)]
        no_verify: bool,
    },
    /// List the course's quizzes, newest first.
    Quizzes {
        #[arg(long)]
        course_id: Option<CourseId>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reqwest=warn,hyper=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            warn!(error = %error, "failed to load .env file");
        }
    }

    let cli = Cli::parse();
    let config = RuntimeConfig::load(&cli.config)?;

    match cli.command {
        Command::Import {
            package,
            course_id,
            file_name,
            budget_secs,
            no_verify,
        } => {
            let course_id = config.course_id(course_id)?;
            let file_name = match file_name {
                Some(name) => name,
                None => package_file_name(&package)?,
            };
            let bytes = tokio::fs::read(&package)
                .await
                .with_context(|| format!("failed to read package {}", package.display()))?;
            info!(package = %package.display(), size = bytes.len(), "package loaded");

            let orchestrator =
                ImportOrchestrator::new(connect(&config)?, config.import_settings(budget_secs, no_verify));
            let cancel = cancel_on_ctrl_c();
            let outcome = orchestrator
                .run(&MigrationRequest::qti_import(course_id, file_name), bytes, &cancel)
                .await;
            report(&outcome)
        }
        Command::Progress {
            progress_url,
            course_id,
            budget_secs,
            no_verify,
        } => {
            let course_id = config.course_id(course_id)?;
            let orchestrator =
                ImportOrchestrator::new(connect(&config)?, config.import_settings(budget_secs, no_verify));
            let cancel = cancel_on_ctrl_c();
            let outcome = orchestrator.resume(course_id, &progress_url, &cancel).await;
            report(&outcome)
        }
        Command::Quizzes { course_id } => {
            let course_id = config.course_id(course_id)?;
            let client = connect(&config)?;
            let mut quizzes = list_quizzes(client.as_ref(), course_id)
                .await
                .context("failed to list course quizzes")?;
            quizzes.sort_by(|a, b| b.id.cmp(&a.id));
            println!("{}", serde_json::to_string_pretty(&quizzes)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn connect(config: &RuntimeConfig) -> Result<Arc<HttpCanvasClient>> {
    let token = config.resolve_token(std::env::var(TOKEN_ENV).ok())?;
    let client = HttpCanvasClient::new(&config.canvas_config(token))
        .context("failed to set up Canvas client")?;
    Ok(Arc::new(client))
}

fn package_file_name(package: &Path) -> Result<String> {
    package
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("cannot derive a file name from {}", package.display()))
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling migration polling");
            trigger.cancel();
        }
    });
    cancel
}

fn report(outcome: &ImportOutcome) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    if outcome.is_error() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
