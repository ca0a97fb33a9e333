use std::time::Duration;

use quizport_canvas::CanvasApi;
use quizport_contract::{parse_migration_status, MigrationStatus, WorkflowState};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use crate::error::{MigrationError, ResponseStatus};

const OPERATION: &str = "migration progress poll";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_BUDGET: Duration = Duration::from_secs(300);

// Stand-in deadline for budgets too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub budget: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            budget: DEFAULT_POLL_BUDGET,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed {
        status: MigrationStatus,
        polls: u32,
    },
    /// The budget ran out first. The job may still finish remotely.
    StillProcessing {
        last_state: Option<WorkflowState>,
        last_completion: Option<f64>,
        polls: u32,
        elapsed: Duration,
    },
    Cancelled {
        last_completion: Option<f64>,
        polls: u32,
    },
}

pub struct MigrationPoller<'a, A: ?Sized> {
    api: &'a A,
    progress_url: Url,
    settings: PollSettings,
}

#[derive(Debug, Default)]
struct Observed {
    polls: u32,
    last_state: Option<WorkflowState>,
    last_completion: Option<f64>,
}

impl<'a, A> MigrationPoller<'a, A>
where
    A: CanvasApi + ?Sized,
{
    pub fn new(api: &'a A, progress_ref: &str, settings: PollSettings) -> Result<Self, MigrationError> {
        let progress_url = resolve_progress_url(api.base_url(), progress_ref)?;
        Ok(Self {
            api,
            progress_url,
            settings,
        })
    }

    pub fn progress_url(&self) -> &Url {
        &self.progress_url
    }

    /// Fetches status every `interval` until `completed` or `failed`.
    ///
    /// Both the budget and `cancel` interrupt an in-flight wait or fetch.
    /// At most `ceil(budget / interval)` fetches are made.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<PollOutcome, MigrationError> {
        let started = Instant::now();
        let deadline = started
            .checked_add(self.settings.budget)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut observed = Observed::default();

        info!(progress_url = %self.progress_url, budget_secs = self.settings.budget.as_secs(), "polling migration progress");

        loop {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(observed));
            }
            if Instant::now() >= deadline {
                return Ok(self.still_processing(observed, started));
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(observed)),
                _ = sleep_until(deadline) => return Ok(self.still_processing(observed, started)),
                fetched = self.fetch() => fetched?,
            };
            observed.polls += 1;

            match status.state {
                WorkflowState::Completed => {
                    info!(polls = observed.polls, "content migration completed");
                    return Ok(PollOutcome::Completed {
                        status,
                        polls: observed.polls,
                    });
                }
                WorkflowState::Failed => {
                    error!(polls = observed.polls, payload = %status.raw, "content migration failed");
                    return Err(MigrationError::ImportFailed {
                        payload: status.raw,
                    });
                }
                _ => {}
            }

            if status.completion.is_some() {
                observed.last_completion = status.completion;
            }
            info!(
                state = %status.state,
                completion = ?observed.last_completion,
                poll = observed.polls,
                "migration in progress"
            );
            observed.last_state = Some(status.state);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(observed)),
                _ = sleep_until(deadline) => return Ok(self.still_processing(observed, started)),
                _ = sleep(self.settings.interval) => {}
            }
        }
    }

    async fn fetch(&self) -> Result<MigrationStatus, MigrationError> {
        let response = self
            .api
            .get_authorized(&self.progress_url)
            .await
            .map_err(|e| MigrationError::unreachable(OPERATION, e))?;

        if !response.is_success() {
            return Err(MigrationError::RemoteRejected {
                operation: OPERATION,
                status: ResponseStatus::Http(response.status),
                body: response.body,
            });
        }

        parse_migration_status(&response.body).map_err(|e| MigrationError::malformed(OPERATION, e))
    }

    fn still_processing(&self, observed: Observed, started: Instant) -> PollOutcome {
        let elapsed = started.elapsed();
        warn!(
            polls = observed.polls,
            elapsed_secs = elapsed.as_secs(),
            completion = ?observed.last_completion,
            "poll budget exhausted before the migration settled"
        );
        PollOutcome::StillProcessing {
            last_state: observed.last_state,
            last_completion: observed.last_completion,
            polls: observed.polls,
            elapsed,
        }
    }

    fn cancelled(&self, observed: Observed) -> PollOutcome {
        warn!(polls = observed.polls, "migration polling cancelled");
        PollOutcome::Cancelled {
            last_completion: observed.last_completion,
            polls: observed.polls,
        }
    }
}

/// Progress references come back either absolute or as a host-relative path.
pub fn resolve_progress_url(base: &Url, progress_ref: &str) -> Result<Url, MigrationError> {
    let trimmed = progress_ref.trim();
    if trimmed.is_empty() {
        return Err(MigrationError::MalformedResponse {
            operation: OPERATION,
            detail: "empty progress reference".to_string(),
        });
    }

    base.join(trimmed)
        .map_err(|e| MigrationError::MalformedResponse {
            operation: OPERATION,
            detail: format!("unusable progress reference `{trimmed}`: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{resolve_progress_url, MigrationPoller, PollOutcome, PollSettings};
    use crate::error::{MigrationError, ResponseStatus};
    use crate::fake::{json_reply, text_reply, ScriptedCanvas, BASE_URL};
    use quizport_contract::WorkflowState;
    use serde_json::json;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    const PROGRESS_URL: &str = "https://canvas.test/api/v1/progress/1";

    fn settings(budget_secs: u64) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(2),
            budget: Duration::from_secs(budget_secs),
        }
    }

    fn running(completion: u64) -> Result<quizport_canvas::RemoteResponse, quizport_canvas::TransportError> {
        json_reply(200, json!({ "workflow_state": "running", "completion": completion }))
    }

    #[test]
    fn relative_and_absolute_references_resolve() {
        let base = Url::parse(BASE_URL).expect("base");
        assert_eq!(
            resolve_progress_url(&base, "/api/v1/progress/1").expect("relative").as_str(),
            PROGRESS_URL
        );
        assert_eq!(
            resolve_progress_url(&base, "https://other.test/api/v1/progress/9")
                .expect("absolute")
                .as_str(),
            "https://other.test/api/v1/progress/9"
        );
        assert!(resolve_progress_url(&base, "  ").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_completed_after_non_terminal_states() {
        let canvas = ScriptedCanvas::new().on_get(
            PROGRESS_URL,
            vec![
                json_reply(200, json!({ "workflow_state": "queued" })),
                json_reply(200, json!({ "workflow_state": "pre_processing", "completion": 10 })),
                running(40),
                json_reply(200, json!({ "workflow_state": "completed", "completion": 100 })),
            ],
        );
        let poller =
            MigrationPoller::new(&canvas, "/api/v1/progress/1", settings(60)).expect("poller");

        let outcome = poller.run(&CancellationToken::new()).await.expect("poll");

        match outcome {
            PollOutcome::Completed { status, polls } => {
                assert_eq!(status.state, WorkflowState::Completed);
                assert_eq!(polls, 4);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(canvas.get_count(PROGRESS_URL), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_state_raises_with_the_raw_payload() {
        let canvas = ScriptedCanvas::new().on_get(
            PROGRESS_URL,
            vec![
                running(20),
                json_reply(
                    200,
                    json!({ "workflow_state": "failed", "message": "invalid QTI manifest" }),
                ),
            ],
        );
        let poller = MigrationPoller::new(&canvas, PROGRESS_URL, settings(60)).expect("poller");

        let error = poller.run(&CancellationToken::new()).await.unwrap_err();

        match error {
            MigrationError::ImportFailed { payload } => {
                assert_eq!(payload["message"], "invalid QTI manifest")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(canvas.get_count(PROGRESS_URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_bounds_the_number_of_fetches() {
        for (budget_secs, expected_polls) in [(30, 15), (5, 3), (4, 2), (1, 1), (0, 0)] {
            let canvas = ScriptedCanvas::new().on_get(PROGRESS_URL, vec![running(40)]);
            let poller =
                MigrationPoller::new(&canvas, PROGRESS_URL, settings(budget_secs)).expect("poller");

            let started = Instant::now();
            let outcome = poller.run(&CancellationToken::new()).await.expect("poll");

            match outcome {
                PollOutcome::StillProcessing {
                    polls,
                    last_completion,
                    last_state,
                    ..
                } => {
                    assert_eq!(polls, expected_polls, "budget {budget_secs}");
                    if expected_polls > 0 {
                        assert_eq!(last_completion, Some(40.0));
                        assert_eq!(last_state, Some(WorkflowState::Running));
                    }
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert_eq!(canvas.get_count(PROGRESS_URL), expected_polls as usize);
            assert!(started.elapsed() < Duration::from_secs(budget_secs) + Duration::from_millis(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_a_slow_fetch() {
        let canvas = ScriptedCanvas::new()
            .on_get(PROGRESS_URL, vec![running(40)])
            .with_get_latency(Duration::from_secs(10));
        let poller = MigrationPoller::new(&canvas, PROGRESS_URL, settings(3)).expect("poller");

        let started = Instant::now();
        let outcome = poller.run(&CancellationToken::new()).await.expect("poll");

        match outcome {
            PollOutcome::StillProcessing {
                polls,
                last_completion,
                ..
            } => {
                assert_eq!(polls, 0);
                assert_eq!(last_completion, None);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
        assert_eq!(canvas.get_count(PROGRESS_URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_budget_still_polls_to_completion() {
        let canvas = ScriptedCanvas::new().on_get(
            PROGRESS_URL,
            vec![
                running(70),
                json_reply(200, json!({ "workflow_state": "completed", "completion": 100 })),
            ],
        );
        let poller = MigrationPoller::new(
            &canvas,
            PROGRESS_URL,
            PollSettings {
                interval: Duration::from_secs(2),
                budget: Duration::from_secs(u64::MAX),
            },
        )
        .expect("poller");

        let outcome = poller.run(&CancellationToken::new()).await.expect("poll");

        assert!(matches!(outcome, PollOutcome::Completed { polls: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn remembers_the_last_reported_completion() {
        let canvas = ScriptedCanvas::new().on_get(
            PROGRESS_URL,
            vec![running(55), json_reply(200, json!({ "workflow_state": "running" }))],
        );
        let poller = MigrationPoller::new(&canvas, PROGRESS_URL, settings(10)).expect("poller");

        let outcome = poller.run(&CancellationToken::new()).await.expect("poll");

        assert!(matches!(
            outcome,
            PollOutcome::StillProcessing {
                last_completion: Some(c),
                ..
            } if c == 55.0
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_wait() {
        let canvas = ScriptedCanvas::new().on_get(PROGRESS_URL, vec![running(10)]);
        let poller = MigrationPoller::new(&canvas, PROGRESS_URL, settings(60)).expect("poller");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let outcome = poller.run(&cancel).await.expect("poll");

        assert_eq!(
            outcome,
            PollOutcome::Cancelled {
                last_completion: Some(10.0),
                polls: 2
            }
        );
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_skips_fetching() {
        let canvas = ScriptedCanvas::new().on_get(PROGRESS_URL, vec![running(10)]);
        let poller = MigrationPoller::new(&canvas, PROGRESS_URL, settings(60)).expect("poller");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poller.run(&cancel).await.expect("poll");

        assert_eq!(
            outcome,
            PollOutcome::Cancelled {
                last_completion: None,
                polls: 0
            }
        );
        assert_eq!(canvas.get_count(PROGRESS_URL), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_poll_is_surfaced_immediately() {
        let canvas = ScriptedCanvas::new()
            .on_get(PROGRESS_URL, vec![running(10), text_reply(500, "oops")]);
        let poller = MigrationPoller::new(&canvas, PROGRESS_URL, settings(60)).expect("poller");

        let error = poller.run(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(
            error,
            MigrationError::RemoteRejected {
                status: ResponseStatus::Http(500),
                ..
            }
        ));
        assert_eq!(canvas.get_count(PROGRESS_URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn status_without_state_is_malformed() {
        let canvas =
            ScriptedCanvas::new().on_get(PROGRESS_URL, vec![json_reply(200, json!({ "id": 1 }))]);
        let poller = MigrationPoller::new(&canvas, PROGRESS_URL, settings(60)).expect("poller");

        let error = poller.run(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(error, MigrationError::MalformedResponse { .. }));
    }
}
