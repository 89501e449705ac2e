use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// How measurement rows reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Print would-be rows; no store access at all.
    DryRun,
    /// One insert + commit per record.
    PerRecord,
    /// Continuous cursor, committing every N records.
    Batched(usize),
}

/// Immutable run configuration, built once from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSettings {
    pub batch_commits: usize,
    pub max_records: u64,
    pub dry_run: bool,
    pub verbose: bool,
    pub show_progress: bool,
}

impl LoadSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_commits(mut self, batch_commits: usize) -> Self {
        self.batch_commits = batch_commits;
        self
    }

    pub fn with_max_records(mut self, max_records: u64) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn insert_mode(&self) -> InsertMode {
        if self.dry_run {
            InsertMode::DryRun
        } else if self.batch_commits > 0 {
            InsertMode::Batched(self.batch_commits)
        } else {
            InsertMode::PerRecord
        }
    }

    /// True once `inserted` has gone past a configured cap.
    pub fn cap_exceeded(&self, inserted: u64) -> bool {
        self.max_records > 0 && inserted > self.max_records
    }
}

/// PostgreSQL connection parameters. Every field must be non-empty for the
/// loader to write to the database.
#[derive(Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub host: String,

    #[validate(range(min = 1))]
    pub port: u16,

    #[validate(length(min = 1))]
    pub user: String,

    #[validate(length(min = 1))]
    pub password: String,

    #[validate(length(min = 1))]
    pub db: String,
}

impl DatabaseConfig {
    pub fn new(host: &str, port: u16, user: &str, password: &str, db: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
            db: db.to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("db", &self.db)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_mode_selection() {
        assert_eq!(LoadSettings::new().insert_mode(), InsertMode::PerRecord);
        assert_eq!(
            LoadSettings::new().with_batch_commits(500).insert_mode(),
            InsertMode::Batched(500)
        );
        assert_eq!(
            LoadSettings::new()
                .with_batch_commits(500)
                .with_dry_run(true)
                .insert_mode(),
            InsertMode::DryRun
        );
    }

    #[test]
    fn test_cap_exceeded() {
        let uncapped = LoadSettings::new();
        assert!(!uncapped.cap_exceeded(u64::MAX));

        let capped = LoadSettings::new().with_max_records(10);
        assert!(!capped.cap_exceeded(10));
        assert!(capped.cap_exceeded(11));
    }

    #[test]
    fn test_database_config_validation() {
        let config = DatabaseConfig::new("localhost", 5432, "loader", "secret", "methane");
        assert!(config.is_complete());

        let missing_password = DatabaseConfig::new("localhost", 5432, "loader", "", "methane");
        assert!(!missing_password.is_complete());
        assert!(missing_password.validate().unwrap_err().field_errors().contains_key("password"));

        let zero_port = DatabaseConfig::new("localhost", 0, "loader", "secret", "methane");
        assert!(!zero_port.is_complete());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DatabaseConfig::new("db", 5432, "loader", "hunter2", "methane");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
