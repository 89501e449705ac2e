use crate::error::Result;
use crate::models::{LoadSettings, RunStats};
use crate::processors::loader::{FileStatus, RecordLoader};
use crate::readers::GridOpener;
use crate::writers::Store;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Loads a set of files one after another and reports the totals.
pub struct RunOrchestrator<'a> {
    loader: RecordLoader<'a>,
}

impl<'a> RunOrchestrator<'a> {
    pub fn new(opener: &'a dyn GridOpener, settings: &'a LoadSettings) -> Result<Self> {
        Ok(Self {
            loader: RecordLoader::new(opener, settings)?,
        })
    }

    /// Process `paths` in order. Stops after the file that exceeded the
    /// record cap; any store error ends the run.
    pub async fn run<S: Store + ?Sized>(
        &self,
        paths: &[PathBuf],
        mut store: Option<&mut S>,
    ) -> Result<RunStats> {
        let mut stats = RunStats::start();
        let started = Instant::now();
        info!(files = paths.len(), "Starting run");

        for path in paths {
            stats.files_seen += 1;
            let outcome = self.loader.load_file(path, store.as_deref_mut()).await?;

            stats.records_inserted += outcome.records_inserted;
            stats.commits += outcome.commits;
            match outcome.status {
                FileStatus::Skipped => stats.files_skipped += 1,
                FileStatus::Completed => stats.files_processed += 1,
                FileStatus::CapReached => {
                    stats.files_processed += 1;
                    stats.cap_reached = true;
                    warn!(
                        remaining = paths.len() - stats.files_seen,
                        "Record cap reached, ending run"
                    );
                    break;
                }
            }
        }

        stats.finish(started.elapsed());
        println!("\n{}", stats.summary());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::{MemoryGrid, MemoryOpener};
    use crate::writers::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn grid() -> MemoryGrid {
        MemoryGrid::methane(3, 3, |_, _| 1_600_000_000.0, |_, _| 1850.0)
    }

    fn fixture(names: &[&str]) -> (TempDir, Vec<PathBuf>, MemoryOpener) {
        let dir = TempDir::new().unwrap();
        let mut opener = MemoryOpener::new();
        let mut paths = Vec::new();
        for name in names {
            let path = dir.path().join(name);
            fs::write(&path, b"").unwrap();
            opener = opener.with_grid(&path, grid());
            paths.push(path);
        }
        (dir, paths, opener)
    }

    #[tokio::test]
    async fn test_run_totals() {
        let (dir, mut paths, opener) = fixture(&["a.nc", "b.nc"]);
        paths.push(dir.path().join("missing.nc"));
        let settings = LoadSettings::new().with_batch_commits(3);
        let orchestrator = RunOrchestrator::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let stats = orchestrator.run(&paths, Some(&mut store)).await.unwrap();
        assert_eq!(stats.files_seen, 3);
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.records_inserted, 8);
        assert_eq!(stats.commits, 4);
        assert!(!stats.cap_reached);
        assert_eq!(store.files().len(), 2);
        assert_eq!(store.measurements().len(), 8);
    }

    #[tokio::test]
    async fn test_cap_ends_run() {
        let (_dir, paths, opener) = fixture(&["a.nc", "b.nc", "c.nc"]);
        // the cap counts records of the file being loaded
        let settings = LoadSettings::new().with_max_records(3);
        let orchestrator = RunOrchestrator::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        let stats = orchestrator.run(&paths, Some(&mut store)).await.unwrap();
        assert!(stats.cap_reached);
        assert_eq!(stats.files_seen, 1);
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.records_inserted, 4);
        assert_eq!(store.files().len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_skips_registered_files() {
        let (_dir, paths, opener) = fixture(&["a.nc"]);
        let settings = LoadSettings::new();
        let orchestrator = RunOrchestrator::new(&opener, &settings).unwrap();
        let mut store = MemoryStore::new();

        orchestrator.run(&paths, Some(&mut store)).await.unwrap();
        let again = orchestrator.run(&paths, Some(&mut store)).await.unwrap();
        assert_eq!(again.files_skipped, 1);
        assert_eq!(again.records_inserted, 0);
        assert_eq!(store.measurements().len(), 4);
    }
}
