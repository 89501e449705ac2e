use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

/// A statement parameter or result column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Null,
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v),
            SqlValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%:z")),
            SqlValue::Null => write!(f, "NULL"),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Transactional access to the relational store.
///
/// A uniqueness violation is reported as
/// [`IngestError::UniqueViolation`](crate::error::IngestError::UniqueViolation);
/// every other failure propagates unchanged. Nothing is retried.
#[async_trait]
pub trait Store: Send {
    /// Execute without committing.
    async fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64>;

    /// Execute and commit. With `return_id`, the first column of the first
    /// returned row.
    async fn insert(
        &mut self,
        statement: &str,
        params: &[SqlValue],
        return_id: bool,
    ) -> Result<Option<i64>>;

    /// Execute on the continuous cursor without committing.
    async fn insert_continuous(
        &mut self,
        statement: &str,
        params: &[SqlValue],
        return_id: bool,
    ) -> Result<Option<i64>>;

    /// Close the continuous cursor, if open, and commit.
    async fn commit(&mut self) -> Result<()>;

    /// Close the continuous cursor, if open, discarding pending statements.
    async fn rollback(&mut self) -> Result<()>;

    /// Execute and fetch every row.
    async fn query(&mut self, statement: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>>;
}
