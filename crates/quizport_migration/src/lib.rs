pub mod error;
pub mod initiator;
pub mod orchestrator;
pub mod poller;
pub mod uploader;
pub mod verification;

#[cfg(test)]
mod fake;

pub use error::{MigrationError, ResponseStatus};
pub use initiator::initiate_migration;
pub use orchestrator::{ImportOrchestrator, ImportSettings};
pub use poller::{MigrationPoller, PollOutcome, PollSettings};
pub use uploader::{upload_package, UploadReceipt};
pub use verification::{list_quizzes, newest_quiz};
