use crate::error::{IngestError, Result};
use crate::models::{FileRecord, RegistrationStatus};
use crate::readers::{GridArrays, GridOpener, MetadataReader, SidecarReader};
use crate::utils::constants::{
    INSERT_FILE_SQL, INSERT_FILE_WITH_SIDECAR_SQL, LAT_DIM, LON_DIM, SELECT_FILE_ID_SQL,
};
use crate::writers::{SqlValue, Store};
use std::path::Path;
use tracing::{debug, warn};

/// Registers dataset files as unique `methane_data_file` rows.
pub struct FileRegistrar<'o> {
    opener: &'o dyn GridOpener,
    metadata: MetadataReader,
    sidecar: SidecarReader,
    verbose: bool,
}

impl<'o> FileRegistrar<'o> {
    pub fn new(opener: &'o dyn GridOpener) -> Self {
        Self {
            opener,
            metadata: MetadataReader::new(),
            sidecar: SidecarReader::new(),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Open `path`, collect its metadata and register it.
    ///
    /// The grid arrays are read and shape-checked before anything is
    /// written, so an unusable file is never registered. Without a store
    /// nothing is written: the record carries the grid with id 0 and
    /// `processed == false`. Unusable files and duplicates are reported and
    /// returned as unprocessed records; only unexpected store failures are
    /// errors.
    pub async fn register<S: Store + ?Sized>(
        &self,
        path: &Path,
        store: Option<&mut S>,
    ) -> Result<FileRecord> {
        if !path.exists() {
            println!("File not found: {}", path.display());
            return Ok(FileRecord::unusable(path, RegistrationStatus::Missing));
        }

        let mut record = match self.prepare(path) {
            Ok(record) => record,
            Err(e) if e.is_unusable_file() => {
                println!("Skipping unreadable file {}: {}", path.display(), e);
                return Ok(FileRecord::unusable(path, RegistrationStatus::Unreadable));
            }
            Err(e) => return Err(e),
        };

        let store = match store {
            Some(store) => store,
            None => {
                debug!(path = %path.display(), "No store, registration skipped");
                return Ok(record);
            }
        };

        let (statement, params) = insert_statement(&record);
        match store.insert(statement, &params, true).await {
            Ok(Some(id)) => {
                record.methane_data_file_id = id;
                record.processed = true;
                record.status = RegistrationStatus::Registered;
                debug!(path = %path.display(), id, "Registered file");
                Ok(record)
            }
            Ok(None) => Err(IngestError::Database(sqlx::Error::RowNotFound)),
            Err(IngestError::UniqueViolation(message)) => {
                println!("Skipping {}: already loaded", record.file_name());
                if self.verbose {
                    match existing_id(store, &record.file_name()).await? {
                        Some(id) => println!("  Existing methane_data_file_id: {}", id),
                        None => println!("  {}", message),
                    }
                }
                record.status = RegistrationStatus::Duplicate;
                record.grid = None;
                Ok(record)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "File registration failed");
                Err(e)
            }
        }
    }

    /// Open the dataset and read everything registration needs.
    fn prepare(&self, path: &Path) -> Result<FileRecord> {
        let dataset = self.opener.open(path)?;
        let metadata = self.metadata.storable_json(dataset.as_ref())?;
        let num_lats = dataset.dimension_len(LAT_DIM)?;
        let num_lons = dataset.dimension_len(LON_DIM)?;
        let grid = GridArrays::read(dataset.as_ref(), num_lats, num_lons)?;
        let sidecar_metadata = self
            .sidecar
            .read_for(path)?
            .map(|doc| serde_json::to_string(&doc))
            .transpose()?;

        let mut record = FileRecord::unusable(path, RegistrationStatus::DryRun);
        record.metadata = Some(metadata);
        record.sidecar_metadata = sidecar_metadata;
        record.num_lats = num_lats;
        record.num_lons = num_lons;
        record.grid = Some(grid);
        Ok(record)
    }
}

fn insert_statement(record: &FileRecord) -> (&'static str, Vec<SqlValue>) {
    let mut params = vec![
        SqlValue::from(record.file_name()),
        SqlValue::from(record.metadata.clone()),
    ];
    match &record.sidecar_metadata {
        Some(sidecar) => {
            params.push(SqlValue::from(sidecar.as_str()));
            (INSERT_FILE_WITH_SIDECAR_SQL, params)
        }
        None => (INSERT_FILE_SQL, params),
    }
}

async fn existing_id<S: Store + ?Sized>(store: &mut S, file_name: &str) -> Result<Option<i64>> {
    let rows = store.query(SELECT_FILE_ID_SQL, &[file_name.into()]).await?;
    Ok(rows
        .first()
        .and_then(|row| row.first())
        .and_then(SqlValue::as_i64))
}
