pub mod file_record;
pub mod measurement;
pub mod run_stats;
pub mod settings;

pub use file_record::{FileRecord, RegistrationStatus};
pub use measurement::MeasurementRecord;
pub use run_stats::{format_throughput, throughput, RunStats};
pub use settings::{DatabaseConfig, InsertMode, LoadSettings};
