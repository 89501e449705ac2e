use crate::readers::GridArrays;
use std::fmt;
use std::path::{Path, PathBuf};

/// Outcome of registering a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// A new `methane_data_file` row was created.
    Registered,
    /// Dataset opened but nothing was written (no-db mode).
    DryRun,
    /// A row for this file name already exists.
    Duplicate,
    /// The path does not exist.
    Missing,
    /// The dataset could not be read or does not hold a usable grid.
    Unreadable,
}

/// A file considered for loading in this run.
pub struct FileRecord {
    pub path: PathBuf,
    pub methane_data_file_id: i64,
    pub metadata: Option<String>,
    pub sidecar_metadata: Option<String>,
    pub num_lats: usize,
    pub num_lons: usize,
    pub processed: bool,
    pub status: RegistrationStatus,
    /// Checked per-cell arrays; `None` unless the file can be loaded.
    pub grid: Option<GridArrays>,
}

impl FileRecord {
    /// A record for a file that could not be used.
    pub fn unusable(path: &Path, status: RegistrationStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            methane_data_file_id: 0,
            metadata: None,
            sidecar_metadata: None,
            num_lats: 0,
            num_lons: 0,
            processed: false,
            status,
            grid: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn has_grid(&self) -> bool {
        self.grid.is_some()
    }

    /// Cells the loader visits; the last row and column are excluded.
    pub fn cell_count(&self) -> usize {
        self.num_lats.saturating_sub(1) * self.num_lons.saturating_sub(1)
    }
}

impl fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRecord")
            .field("path", &self.path)
            .field("methane_data_file_id", &self.methane_data_file_id)
            .field("num_lats", &self.num_lats)
            .field("num_lons", &self.num_lons)
            .field("processed", &self.processed)
            .field("status", &self.status)
            .field("has_grid", &self.has_grid())
            .field("has_sidecar", &self.sidecar_metadata.is_some())
            .finish()
    }
}
