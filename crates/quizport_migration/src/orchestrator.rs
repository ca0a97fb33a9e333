use std::sync::Arc;

use quizport_canvas::CanvasApi;
use quizport_contract::{CourseId, ImportOutcome, MigrationRequest};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::MigrationError;
use crate::initiator::initiate_migration;
use crate::poller::{MigrationPoller, PollOutcome, PollSettings};
use crate::uploader::upload_package;
use crate::verification::{list_quizzes, newest_quiz};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSettings {
    pub poll: PollSettings,
    /// List the course's quizzes after completion to name the new one.
    pub verify: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            verify: true,
        }
    }
}

/// Runs initiate, upload and poll in sequence and folds every result into
/// one [`ImportOutcome`]. Never returns an error to its caller.
///
/// Nothing is rolled back: a migration opened remotely stays in whatever
/// state the service leaves it.
pub struct ImportOrchestrator<A: ?Sized> {
    api: Arc<A>,
    settings: ImportSettings,
}

impl<A> ImportOrchestrator<A>
where
    A: CanvasApi + ?Sized,
{
    pub fn new(api: Arc<A>, settings: ImportSettings) -> Self {
        Self { api, settings }
    }

    pub async fn run(
        &self,
        request: &MigrationRequest,
        package: Vec<u8>,
        cancel: &CancellationToken,
    ) -> ImportOutcome {
        let span = info_span!(
            "import",
            import_id = %Uuid::now_v7(),
            course_id = request.course_id,
            file_name = %request.file_name
        );
        self.run_stages(request, package, cancel)
            .instrument(span)
            .await
    }

    /// Picks up an existing migration at its progress reference, e.g. after
    /// an earlier run ran out of budget.
    pub async fn resume(
        &self,
        course_id: CourseId,
        progress_ref: &str,
        cancel: &CancellationToken,
    ) -> ImportOutcome {
        let span = info_span!("resume", import_id = %Uuid::now_v7(), course_id);
        self.observe(course_id, progress_ref, cancel)
            .instrument(span)
            .await
    }

    async fn run_stages(
        &self,
        request: &MigrationRequest,
        package: Vec<u8>,
        cancel: &CancellationToken,
    ) -> ImportOutcome {
        let target = match initiate_migration(&*self.api, request).await {
            Ok(target) => target,
            Err(error) => return failure("initiate", error, None),
        };

        if let Err(error) = upload_package(&*self.api, &target, &request.file_name, package).await {
            return failure("upload", error, None);
        }

        self.observe(request.course_id, &target.progress_url, cancel)
            .await
    }

    async fn observe(
        &self,
        course_id: CourseId,
        progress_ref: &str,
        cancel: &CancellationToken,
    ) -> ImportOutcome {
        let poller = match MigrationPoller::new(&*self.api, progress_ref, self.settings.poll) {
            Ok(poller) => poller,
            Err(error) => return failure("poll", error, None),
        };
        let progress_url = Some(poller.progress_url().to_string());

        match poller.run(cancel).await {
            Ok(PollOutcome::Completed { .. }) => self
                .verify(course_id)
                .await
                .with_progress_url(progress_url),
            Ok(PollOutcome::StillProcessing {
                last_completion,
                elapsed,
                ..
            }) => ImportOutcome::warning(format!(
                "migration still processing after {}s; last reported completion {}",
                elapsed.as_secs(),
                describe_completion(last_completion)
            ))
            .with_progress_url(progress_url),
            Ok(PollOutcome::Cancelled {
                last_completion, ..
            }) => ImportOutcome::warning(format!(
                "polling cancelled before the migration finished; last reported completion {}",
                describe_completion(last_completion)
            ))
            .with_progress_url(progress_url),
            Err(error) => failure("poll", error, progress_url),
        }
    }

    async fn verify(&self, course_id: CourseId) -> ImportOutcome {
        if !self.settings.verify {
            return ImportOutcome::success("content migration completed");
        }

        match list_quizzes(&*self.api, course_id).await {
            Ok(quizzes) => match newest_quiz(&quizzes) {
                Some(quiz) => {
                    info!(quiz_id = quiz.id, title = %quiz.title, "newest quiz after import");
                    ImportOutcome::success(format!(
                        "content migration completed; newest quiz is '{}' (id {})",
                        quiz.title, quiz.id
                    ))
                    .with_quiz_id(quiz.id)
                }
                None => {
                    warn!("course lists no quizzes after a completed import");
                    ImportOutcome::warning(
                        "content migration completed but the course lists no quizzes",
                    )
                }
            },
            Err(error) => {
                warn!(error = %error, "post-import verification failed");
                ImportOutcome::warning(format!(
                    "content migration completed but verification failed: {error}"
                ))
            }
        }
    }
}

fn failure(stage: &'static str, error: MigrationError, progress_url: Option<String>) -> ImportOutcome {
    error!(
        stage,
        error = %error,
        retryable = error.is_retryable_by_caller(),
        "import stage failed"
    );
    let outcome = ImportOutcome::error(error.to_string()).with_progress_url(progress_url);
    match error {
        MigrationError::ImportFailed { payload } => outcome.with_diagnostics(payload),
        _ => outcome,
    }
}

fn describe_completion(completion: Option<f64>) -> String {
    match completion {
        Some(percent) if percent.fract() == 0.0 => format!("{percent:.0}%"),
        Some(percent) => format!("{percent:.1}%"),
        None => "unknown".to_string(),
    }
}
