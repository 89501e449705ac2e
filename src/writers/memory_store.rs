use crate::error::{IngestError, Result};
use crate::writers::store::{SqlValue, Store};
use async_trait::async_trait;

/// One call made against a [`MemoryStore`], with its statement where it has one.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Execute(String),
    Insert(String),
    InsertContinuous(String),
    Commit,
    Rollback,
    Query(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub methane_data_file_id: i64,
    pub file_name: String,
    pub metadata: SqlValue,
    pub xmlmetadata: SqlValue,
}

/// In-process store for tests and benchmarks.
///
/// Understands the loader's own statements: file rows get generated ids and
/// a unique `file_name`, measurement rows are kept as parameter lists. Rows
/// only become visible in [`MemoryStore::files`] / [`MemoryStore::measurements`]
/// once committed. A failed statement discards the open transaction, as
/// PostgreSQL does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    calls: Vec<StoreCall>,
    files: Vec<FileRow>,
    measurements: Vec<Vec<SqlValue>>,
    pending_files: Vec<FileRow>,
    pending_measurements: Vec<Vec<SqlValue>>,
    last_id: i64,
    cursor_open: bool,
    cursor_opens: u64,
    measurement_attempts: u64,
    fail_on_measurement: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th measurement insert (1-based) fail with a database error.
    pub fn with_failure_on_measurement(mut self, n: u64) -> Self {
        self.fail_on_measurement = Some(n);
        self
    }

    pub fn calls(&self) -> &[StoreCall] {
        &self.calls
    }

    pub fn files(&self) -> &[FileRow] {
        &self.files
    }

    pub fn measurements(&self) -> &[Vec<SqlValue>] {
        &self.measurements
    }

    pub fn pending_measurements(&self) -> usize {
        self.pending_measurements.len()
    }

    pub fn commit_calls(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::Commit))
    }

    pub fn insert_calls(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::Insert(_)))
    }

    pub fn continuous_calls(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::InsertContinuous(_)))
    }

    pub fn is_cursor_open(&self) -> bool {
        self.cursor_open
    }

    /// How many times a continuous cursor has been opened.
    pub fn cursor_opens(&self) -> u64 {
        self.cursor_opens
    }

    fn count(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    fn open_cursor(&mut self) {
        if !self.cursor_open {
            self.cursor_open = true;
            self.cursor_opens += 1;
        }
    }

    fn commit_pending(&mut self) {
        self.files.append(&mut self.pending_files);
        self.measurements.append(&mut self.pending_measurements);
        self.cursor_open = false;
    }

    fn discard_pending(&mut self) {
        self.pending_files.clear();
        self.pending_measurements.clear();
        self.cursor_open = false;
    }

    fn apply(&mut self, statement: &str, params: &[SqlValue]) -> Result<Option<i64>> {
        let result = self.apply_statement(statement, params);
        if result.is_err() {
            self.discard_pending();
        }
        result
    }

    fn apply_statement(&mut self, statement: &str, params: &[SqlValue]) -> Result<Option<i64>> {
        if statement.starts_with("INSERT INTO methane_data_file") {
            let file_name = match params.first() {
                Some(SqlValue::Text(name)) => name.clone(),
                _ => return Err(IngestError::Config("file_name must be text".to_string())),
            };
            if self.find_file(&file_name).is_some() {
                return Err(IngestError::UniqueViolation(format!(
                    "duplicate key value violates unique constraint \"methane_data_file_file_name_key\": {}",
                    file_name
                )));
            }

            self.last_id += 1;
            self.pending_files.push(FileRow {
                methane_data_file_id: self.last_id,
                file_name,
                metadata: params.get(1).cloned().unwrap_or(SqlValue::Null),
                xmlmetadata: params.get(2).cloned().unwrap_or(SqlValue::Null),
            });
            return Ok(Some(self.last_id));
        }

        if statement.starts_with("INSERT INTO methane_data") {
            self.measurement_attempts += 1;
            if self.fail_on_measurement == Some(self.measurement_attempts) {
                return Err(IngestError::Database(sqlx::Error::Protocol(
                    "connection reset while inserting measurement".to_string(),
                )));
            }
            self.pending_measurements.push(params.to_vec());
        }
        Ok(None)
    }

    fn find_file(&self, file_name: &str) -> Option<&FileRow> {
        self.files
            .iter()
            .chain(&self.pending_files)
            .find(|f| f.file_name == file_name)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        self.calls.push(StoreCall::Execute(statement.to_string()));
        self.open_cursor();
        self.apply(statement, params)?;
        Ok(1)
    }

    async fn insert(
        &mut self,
        statement: &str,
        params: &[SqlValue],
        return_id: bool,
    ) -> Result<Option<i64>> {
        self.calls.push(StoreCall::Insert(statement.to_string()));
        let id = self.apply(statement, params)?;
        self.commit_pending();
        Ok(if return_id { id } else { None })
    }

    async fn insert_continuous(
        &mut self,
        statement: &str,
        params: &[SqlValue],
        return_id: bool,
    ) -> Result<Option<i64>> {
        self.calls
            .push(StoreCall::InsertContinuous(statement.to_string()));
        self.open_cursor();
        let id = self.apply(statement, params)?;
        Ok(if return_id { id } else { None })
    }

    async fn commit(&mut self) -> Result<()> {
        self.calls.push(StoreCall::Commit);
        self.commit_pending();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.calls.push(StoreCall::Rollback);
        self.discard_pending();
        Ok(())
    }

    async fn query(&mut self, statement: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
        self.calls.push(StoreCall::Query(statement.to_string()));

        if statement.starts_with("SELECT methane_data_file_id FROM methane_data_file") {
            let rows = match params.first() {
                Some(SqlValue::Text(name)) => self
                    .find_file(name)
                    .map(|f| vec![vec![SqlValue::Int(f.methane_data_file_id)]])
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            return Ok(rows);
        }
        Ok(Vec::new())
    }
}
