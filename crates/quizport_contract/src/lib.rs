pub mod migration;
pub mod outcome;
pub mod wire;

pub use migration::{
    CourseId, MigrationRequest, MigrationStatus, MigrationType, QuizId, QuizSummary,
    UploadTarget, WorkflowState,
};
pub use outcome::{ImportOutcome, OutcomeStatus};
pub use wire::{parse_migration_status, parse_quiz_list, parse_upload_target, ParseError};
