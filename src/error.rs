use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not connect to database: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Could not open dataset {path}: {message}")]
    DatasetOpen { path: PathBuf, message: String },

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid time units '{0}'")]
    InvalidTimeUnits(String),

    #[error("Unsupported calendar '{0}'")]
    UnsupportedCalendar(String),

    #[error("Time value {0} is outside the representable range")]
    TimeOutOfRange(f64),

    #[error("Invalid sidecar descriptor {path}: {message}")]
    Sidecar { path: PathBuf, message: String },

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl IngestError {
    /// Errors that make a single file unusable without ending the run.
    pub fn is_unusable_file(&self) -> bool {
        matches!(
            self,
            IngestError::DatasetOpen { .. }
                | IngestError::MissingData(_)
                | IngestError::Sidecar { .. }
        )
    }
}
