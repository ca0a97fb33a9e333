use quizport_canvas::CanvasApi;
use quizport_contract::{parse_quiz_list, CourseId, QuizSummary};
use tracing::debug;

use crate::error::{MigrationError, ResponseStatus};

const OPERATION: &str = "quiz listing";

pub async fn list_quizzes<A>(api: &A, course_id: CourseId) -> Result<Vec<QuizSummary>, MigrationError>
where
    A: CanvasApi + ?Sized,
{
    let response = api
        .list_quizzes(course_id)
        .await
        .map_err(|e| MigrationError::unreachable(OPERATION, e))?;

    if !response.is_success() {
        return Err(MigrationError::RemoteRejected {
            operation: OPERATION,
            status: ResponseStatus::Http(response.status),
            body: response.body,
        });
    }

    let quizzes =
        parse_quiz_list(&response.body).map_err(|e| MigrationError::malformed(OPERATION, e))?;
    debug!(course_id, count = quizzes.len(), "listed course quizzes");
    Ok(quizzes)
}

/// The quiz with the highest id.
///
/// Best effort only: a concurrent import into the same course can create a
/// newer quiz, and nothing ties a migration to the quiz it produced.
pub fn newest_quiz(quizzes: &[QuizSummary]) -> Option<&QuizSummary> {
    quizzes.iter().max_by_key(|quiz| quiz.id)
}
