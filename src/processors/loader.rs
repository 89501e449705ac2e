use crate::error::Result;
use crate::models::{format_throughput, FileRecord, LoadSettings, MeasurementRecord};
use crate::processors::registrar::FileRegistrar;
use crate::readers::{GridArrays, GridOpener};
use crate::utils::cftime::{is_after_epoch, truncate_to_minute, TimeUnits};
use crate::utils::constants::{TIME_CALENDAR, TIME_UNITS};
use crate::utils::progress::ProgressReporter;
use crate::writers::{strategy_for, InsertStrategy, Store};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Unusable, duplicate or unregistered; nothing was loaded.
    Skipped,
    Completed,
    /// The record cap was exceeded while loading this file.
    CapReached,
}

/// What loading one file produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    pub cells_visited: u64,
    pub records_inserted: u64,
    pub commits: u64,
    pub elapsed: Duration,
}

impl FileOutcome {
    fn skipped(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            status: FileStatus::Skipped,
            cells_visited: 0,
            records_inserted: 0,
            commits: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Registers a file and turns its grid cells into measurement rows.
pub struct RecordLoader<'a> {
    registrar: FileRegistrar<'a>,
    settings: &'a LoadSettings,
    time_units: TimeUnits,
}

impl<'a> RecordLoader<'a> {
    pub fn new(opener: &'a dyn GridOpener, settings: &'a LoadSettings) -> Result<Self> {
        Ok(Self {
            registrar: FileRegistrar::new(opener).with_verbose(settings.verbose),
            settings,
            time_units: TimeUnits::parse(TIME_UNITS, TIME_CALENDAR)?,
        })
    }

    /// Register `path` and load its cells with the configured strategy.
    ///
    /// In dry-run mode the store is never touched, even when one is given.
    pub async fn load_file<S: Store + ?Sized>(
        &self,
        path: &Path,
        store: Option<&mut S>,
    ) -> Result<FileOutcome> {
        let mut store = if self.settings.dry_run { None } else { store };

        let record = self.registrar.register(path, store.as_deref_mut()).await?;
        let arrays = match record.grid.as_ref() {
            Some(arrays) if record.processed || self.settings.dry_run => arrays,
            _ => return Ok(FileOutcome::skipped(path)),
        };

        let mut strategy = strategy_for(self.settings.insert_mode(), store)?;
        debug!(path = %path.display(), strategy = strategy.name(), "Loading file");
        self.ingest(&record, arrays, strategy.as_mut()).await
    }

    async fn ingest(
        &self,
        record: &FileRecord,
        arrays: &GridArrays,
        strategy: &mut dyn InsertStrategy,
    ) -> Result<FileOutcome> {
        let file_name = record.file_name();
        let silent =
            self.settings.dry_run || self.settings.verbose || !self.settings.show_progress;
        let progress = ProgressReporter::new(record.cell_count() as u64, &file_name, silent);

        let started = Instant::now();
        let mut cells_visited = 0u64;
        let mut inserted = 0u64;

        // The last index of each dimension is never visited.
        for lon_index in 0..record.num_lons.saturating_sub(1) {
            for lat_index in 0..record.num_lats.saturating_sub(1) {
                cells_visited += 1;
                progress.increment(1);

                let Some(recorded_at) = self.recorded_at(arrays.time.at(&[lat_index, lon_index])?)
                else {
                    continue;
                };

                let measurement = MeasurementRecord::new(
                    record.methane_data_file_id,
                    recorded_at,
                    arrays.lats.at(&[lat_index])?,
                    arrays.lons.at(&[lon_index])?,
                    arrays.xch4.at(&[lat_index, lon_index])?,
                );
                strategy.insert(&measurement).await?;
                inserted += 1;

                if self.settings.cap_exceeded(inserted) {
                    strategy.finish().await?;
                    progress.finish_and_clear();
                    let elapsed = started.elapsed();
                    println!(
                        "Record cap of {} exceeded: {} records from {} in {:.3}s ({})",
                        self.settings.max_records,
                        inserted,
                        file_name,
                        elapsed.as_secs_f64(),
                        format_throughput(inserted, elapsed)
                    );
                    return Ok(FileOutcome {
                        path: record.path.clone(),
                        status: FileStatus::CapReached,
                        cells_visited,
                        records_inserted: inserted,
                        commits: strategy.commits(),
                        elapsed,
                    });
                }
            }
        }

        strategy.finish().await?;
        progress.finish_and_clear();
        let elapsed = started.elapsed();

        println!(
            "Loaded {} records from {} in {:.3}s",
            inserted,
            file_name,
            elapsed.as_secs_f64()
        );
        if self.settings.verbose {
            println!("  Throughput: {}", format_throughput(inserted, elapsed));
        }
        info!(file = %file_name, cells_visited, inserted, commits = strategy.commits(), "File loaded");

        Ok(FileOutcome {
            path: record.path.clone(),
            status: FileStatus::Completed,
            cells_visited,
            records_inserted: inserted,
            commits: strategy.commits(),
            elapsed,
        })
    }

    /// Minute-resolution timestamp of a cell, `None` when the cell is skipped.
    fn recorded_at(&self, value: f64) -> Option<DateTime<Utc>> {
        match self.time_units.to_datetime(value) {
            Ok(timestamp) => {
                let timestamp = truncate_to_minute(timestamp);
                is_after_epoch(timestamp).then_some(timestamp)
            }
            Err(e) => {
                debug!(value, error = %e, "Skipping cell with unconvertible time");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::{MemoryGrid, MemoryOpener};
    use crate::utils::constants::{INSERT_FILE_SQL, INSERT_MEASUREMENT_SQL};
    use crate::writers::{MemoryStore, SqlValue, StoreCall};
    use std::fs;
    use tempfile::TempDir;

    const JUNE_2020: f64 = 1_590_969_600.0;

    fn fixture(name: &str, grid: MemoryGrid) -> (TempDir, PathBuf, MemoryOpener) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, b"").unwrap();
        let opener = MemoryOpener::new().with_grid(&path, grid);
        (dir, path, opener)
    }

    fn valid_grid(num_lats: usize, num_lons: usize) -> MemoryGrid {
        MemoryGrid::methane(
            num_lats,
            num_lons,
            |lat, lon| JUNE_2020 + (lat * 60 + lon * 3600) as f64 + 17.0,
            |lat, lon| 1800.0 + (lat * 10 + lon) as f64,
        )
    }

    fn settings() -> LoadSettings {
        LoadSettings::new().with_progress(false)
    }

    #[tokio::test]
    async fn test_per_record_three_by_three() {
        let (_dir, path, opener) = fixture("a.nc", valid_grid(3, 3));
        let settings = settings().with_batch_commits(0);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let outcome = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(outcome.status, FileStatus::Completed);
        assert_eq!(outcome.cells_visited, 4);
        assert_eq!(outcome.records_inserted, 4);
        assert_eq!(outcome.commits, 4);

        let measurement_inserts = store
            .calls()
            .iter()
            .filter(|c| **c == StoreCall::Insert(INSERT_MEASUREMENT_SQL.to_string()))
            .count();
        assert_eq!(measurement_inserts, 4);
        assert_eq!(store.measurements().len(), 4);
    }

    #[tokio::test]
    async fn test_cells_visited_lon_outer_lat_inner() {
        let (_dir, path, opener) = fixture("a.nc", valid_grid(3, 4));
        let settings = settings().with_batch_commits(0);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let outcome = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(outcome.cells_visited, 6);

        let coordinates: Vec<(SqlValue, SqlValue)> = store
            .measurements()
            .iter()
            .map(|row| (row[2].clone(), row[3].clone()))
            .collect();
        assert_eq!(
            coordinates,
            vec![
                (SqlValue::Float(-89.5), SqlValue::Float(-179.5)),
                (SqlValue::Float(-88.5), SqlValue::Float(-179.5)),
                (SqlValue::Float(-89.5), SqlValue::Float(-178.5)),
                (SqlValue::Float(-88.5), SqlValue::Float(-178.5)),
                (SqlValue::Float(-89.5), SqlValue::Float(-177.5)),
                (SqlValue::Float(-88.5), SqlValue::Float(-177.5)),
            ]
        );
    }

    #[tokio::test]
    async fn test_timestamps_truncated_to_minute() {
        let (_dir, path, opener) = fixture("a.nc", valid_grid(2, 2));
        let settings = settings().with_batch_commits(0);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        loader.load_file(&path, Some(&mut store)).await.unwrap();
        let row = &store.measurements()[0];
        assert_eq!(row[0], SqlValue::Int(1));
        match &row[1] {
            SqlValue::Timestamp(ts) => assert_eq!(ts.to_rfc3339(), "2020-06-01T00:00:00+00:00"),
            other => panic!("unexpected timestamp {other:?}"),
        }
        assert_eq!(row[4], SqlValue::Float(1800.0));
    }

    #[tokio::test]
    async fn test_epoch_and_unconvertible_cells_skipped() {
        let grid = MemoryGrid::methane(
            3,
            3,
            |lat, lon| match (lat, lon) {
                (0, 0) => 0.0,
                (1, 0) => f64::NAN,
                _ => JUNE_2020,
            },
            |_, _| 1850.0,
        );
        let (_dir, path, opener) = fixture("a.nc", grid);
        let settings = settings().with_batch_commits(0);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let outcome = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(outcome.cells_visited, 4);
        assert_eq!(outcome.records_inserted, 2);
        assert_eq!(store.measurements().len(), 2);
    }

    #[tokio::test]
    async fn test_single_epoch_cell_gives_three_records() {
        let grid = MemoryGrid::methane(
            3,
            3,
            |lat, lon| if (lat, lon) == (1, 1) { 30.0 } else { JUNE_2020 },
            |_, _| 1850.0,
        );
        let (_dir, path, opener) = fixture("a.nc", grid);
        let settings = settings().with_batch_commits(0);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let outcome = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(outcome.records_inserted, 3);
    }

    #[tokio::test]
    async fn test_batched_load_commits_and_flushes() {
        let (_dir, path, opener) = fixture("a.nc", valid_grid(4, 4));
        let settings = settings().with_batch_commits(4);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let outcome = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(outcome.records_inserted, 9);
        // two full batches and the final flush
        assert_eq!(outcome.commits, 3);
        assert_eq!(store.commit_calls(), 3);
        assert_eq!(store.continuous_calls(), 9);
        assert_eq!(store.measurements().len(), 9);
        assert!(!store.is_cursor_open());
    }

    #[tokio::test]
    async fn test_cap_stops_loading() {
        let (_dir, path, opener) = fixture("a.nc", valid_grid(4, 4));
        let settings = settings().with_batch_commits(2).with_max_records(3);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let outcome = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(outcome.status, FileStatus::CapReached);
        assert_eq!(outcome.records_inserted, 4);
        assert_eq!(outcome.cells_visited, 4);
        assert_eq!(store.measurements().len(), 4);
        assert_eq!(store.pending_measurements(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_file_contributes_nothing() {
        let (_dir, path, opener) = fixture("a.nc", valid_grid(3, 3));
        let settings = settings().with_batch_commits(0);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        loader.load_file(&path, Some(&mut store)).await.unwrap();
        let second = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(second.status, FileStatus::Skipped);
        assert_eq!(second.records_inserted, 0);
        assert_eq!(store.files().len(), 1);
        assert_eq!(store.measurements().len(), 4);
    }

    #[tokio::test]
    async fn test_dry_run_never_touches_store() {
        let (_dir, path, opener) = fixture("a.nc", valid_grid(3, 3));
        let settings = settings().with_dry_run(true);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let outcome = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(outcome.status, FileStatus::Completed);
        assert_eq!(outcome.records_inserted, 4);
        assert_eq!(outcome.commits, 0);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_variable_skips_file() {
        let grid = MemoryGrid::new()
            .with_dimension("lat", 3)
            .with_dimension("lon", 3)
            .with_variable("lat", &["lat"], vec![0.0, 1.0, 2.0]);
        let (_dir, path, opener) = fixture("a.nc", grid);
        let settings = settings().with_dry_run(true);
        let loader = RecordLoader::new(&opener, &settings).unwrap();

        let outcome = loader.load_file(&path, None::<&mut MemoryStore>).await.unwrap();
        assert_eq!(outcome.status, FileStatus::Skipped);
    }

    #[tokio::test]
    async fn test_mismatched_time_shape_skips_file() {
        let grid = valid_grid(3, 3).with_variable("time", &["lat"], vec![JUNE_2020; 3]);
        let (_dir, path, opener) = fixture("a.nc", grid);
        let settings = settings().with_batch_commits(0);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let outcome = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(outcome.status, FileStatus::Skipped);
        assert!(store.measurements().is_empty());
        assert!(store.files().is_empty());
        assert!(store.calls().is_empty());

        // the file stays loadable once its shape is fixed
        let (_dir, path, opener) = fixture("a.nc", valid_grid(3, 3));
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let retried = loader.load_file(&path, Some(&mut store)).await.unwrap();
        assert_eq!(retried.status, FileStatus::Completed);
        assert_eq!(store.files().len(), 1);
    }

    #[tokio::test]
    async fn test_single_row_grid_visits_no_cells() {
        for (num_lats, num_lons) in [(1, 4), (4, 1)] {
            let (_dir, path, opener) = fixture("a.nc", valid_grid(num_lats, num_lons));
            let settings = settings().with_batch_commits(2);
            let loader = RecordLoader::new(&opener, &settings).unwrap();
            let mut store = MemoryStore::new();

            let outcome = loader.load_file(&path, Some(&mut store)).await.unwrap();
            assert_eq!(outcome.status, FileStatus::Completed);
            assert_eq!(outcome.cells_visited, 0);
            assert_eq!(outcome.records_inserted, 0);
            assert_eq!(outcome.commits, 0);
            assert_eq!(store.files().len(), 1);
            assert!(store.measurements().is_empty());
            assert_eq!(
                store.calls(),
                &[StoreCall::Insert(INSERT_FILE_SQL.to_string())]
            );
        }
    }

    #[tokio::test]
    async fn test_insert_failure_propagates() {
        let (_dir, path, opener) = fixture("a.nc", valid_grid(3, 3));
        let settings = settings().with_batch_commits(10);
        let loader = RecordLoader::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new().with_failure_on_measurement(3);

        let result = loader.load_file(&path, Some(&mut store)).await;
        assert!(result.is_err());
        assert_eq!(store.files().len(), 1);
        assert!(store.measurements().is_empty());
    }
}
