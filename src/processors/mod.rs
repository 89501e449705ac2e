pub mod loader;
pub mod orchestrator;
pub mod registrar;

pub use loader::{FileOutcome, FileStatus, RecordLoader};
pub use orchestrator::RunOrchestrator;
pub use registrar::FileRegistrar;
