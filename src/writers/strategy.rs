use crate::error::{IngestError, Result};
use crate::models::{InsertMode, MeasurementRecord};
use crate::utils::constants::INSERT_MEASUREMENT_SQL;
use crate::writers::store::Store;
use async_trait::async_trait;
use std::io::Write;
use tracing::debug;

/// Delivery of measurement records for one file.
#[async_trait]
pub trait InsertStrategy: Send {
    async fn insert(&mut self, record: &MeasurementRecord) -> Result<()>;

    /// Make everything inserted so far durable. Called once when the file
    /// ends, normally or through the record cap.
    async fn finish(&mut self) -> Result<()>;

    /// Commits issued so far, including the final flush.
    fn commits(&self) -> u64;

    fn name(&self) -> &'static str;
}

/// Insert and commit every record on its own.
pub struct PerRecordCommit<'s, S: Store + ?Sized> {
    store: &'s mut S,
    commits: u64,
}

impl<'s, S: Store + ?Sized> PerRecordCommit<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store, commits: 0 }
    }
}

#[async_trait]
impl<'s, S: Store + ?Sized> InsertStrategy for PerRecordCommit<'s, S> {
    async fn insert(&mut self, record: &MeasurementRecord) -> Result<()> {
        self.store
            .insert(INSERT_MEASUREMENT_SQL, &record.to_params(), false)
            .await?;
        self.commits += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn commits(&self) -> u64 {
        self.commits
    }

    fn name(&self) -> &'static str {
        "per-record commit"
    }
}

/// Insert on the continuous cursor and commit every `batch_size` records.
///
/// Records after the last full batch stay uncommitted until
/// [`InsertStrategy::finish`]; if the run dies first they are lost.
pub struct BatchedCommit<'s, S: Store + ?Sized> {
    store: &'s mut S,
    batch_size: u64,
    inserted: u64,
    pending: u64,
    commits: u64,
}

impl<'s, S: Store + ?Sized> BatchedCommit<'s, S> {
    pub fn new(store: &'s mut S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1) as u64,
            inserted: 0,
            pending: 0,
            commits: 0,
        }
    }

    /// Records inserted but not yet committed.
    pub fn pending(&self) -> u64 {
        self.pending
    }
}

#[async_trait]
impl<'s, S: Store + ?Sized> InsertStrategy for BatchedCommit<'s, S> {
    async fn insert(&mut self, record: &MeasurementRecord) -> Result<()> {
        self.store
            .insert_continuous(INSERT_MEASUREMENT_SQL, &record.to_params(), false)
            .await?;
        self.inserted += 1;
        self.pending += 1;

        if self.inserted % self.batch_size == 0 {
            self.store.commit().await?;
            self.commits += 1;
            self.pending = 0;
            debug!(inserted = self.inserted, "Committed batch");
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.pending > 0 {
            self.store.commit().await?;
            self.commits += 1;
            debug!(flushed = self.pending, "Committed final partial batch");
            self.pending = 0;
        }
        Ok(())
    }

    fn commits(&self) -> u64 {
        self.commits
    }

    fn name(&self) -> &'static str {
        "batched commit"
    }
}

/// Print the parameters each insert would have used.
pub struct DryRunPrint<W: Write + Send> {
    out: W,
    printed: u64,
}

impl DryRunPrint<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> DryRunPrint<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    pub fn printed(&self) -> u64 {
        self.printed
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> InsertStrategy for DryRunPrint<W> {
    async fn insert(&mut self, record: &MeasurementRecord) -> Result<()> {
        writeln!(self.out, "{}", record)?;
        self.printed += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn commits(&self) -> u64 {
        0
    }

    fn name(&self) -> &'static str {
        "dry run"
    }
}

/// The strategy configured by `mode`. Every mode except [`InsertMode::DryRun`]
/// needs a store.
pub fn strategy_for<'s, S: Store + ?Sized + 's>(
    mode: InsertMode,
    store: Option<&'s mut S>,
) -> Result<Box<dyn InsertStrategy + 's>> {
    match (mode, store) {
        (InsertMode::DryRun, _) => Ok(Box::new(DryRunPrint::stdout())),
        (InsertMode::PerRecord, Some(store)) => Ok(Box::new(PerRecordCommit::new(store))),
        (InsertMode::Batched(size), Some(store)) => Ok(Box::new(BatchedCommit::new(store, size))),
        (mode, None) => Err(IngestError::Config(format!(
            "{:?} insertion needs a database connection",
            mode
        ))),
    }
}
