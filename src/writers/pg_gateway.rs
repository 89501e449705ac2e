//! PostgreSQL implementation of [`Store`].

use crate::error::{IngestError, Result};
use crate::models::DatabaseConfig;
use crate::writers::store::{SqlValue, Store};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, Transaction, TypeInfo};
use std::time::Duration;
use tracing::{debug, info};

/// The one open transaction reused by continuous inserts.
///
/// Opened lazily by the first statement that needs it and closed exactly once
/// by [`ContinuousCursor::commit`] or [`ContinuousCursor::rollback`]. A cursor
/// dropped while open is rolled back by sqlx.
struct ContinuousCursor {
    tx: Transaction<'static, Postgres>,
    statements: u64,
}

impl ContinuousCursor {
    async fn open(pool: &PgPool) -> Result<Self> {
        Ok(Self {
            tx: pool.begin().await?,
            statements: 0,
        })
    }

    async fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        let result = bind_params(sqlx::query(statement), params)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        self.statements += 1;
        Ok(result.rows_affected())
    }

    async fn fetch_id(&mut self, statement: &str, params: &[SqlValue]) -> Result<Option<i64>> {
        let row = bind_params(sqlx::query(statement), params)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        self.statements += 1;
        row.map(|r| first_column_id(&r)).transpose()
    }

    async fn fetch_all(&mut self, statement: &str, params: &[SqlValue]) -> Result<Vec<PgRow>> {
        let rows = bind_params(sqlx::query(statement), params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        self.statements += 1;
        Ok(rows)
    }

    async fn commit(self) -> Result<u64> {
        self.tx.commit().await?;
        Ok(self.statements)
    }

    async fn rollback(self) -> Result<u64> {
        self.tx.rollback().await?;
        Ok(self.statements)
    }
}

/// Single-connection gateway to the loader's PostgreSQL database.
pub struct PgGateway {
    pool: PgPool,
    cursor: Option<ContinuousCursor>,
}

impl PgGateway {
    /// Connect eagerly. Failure is returned to the caller, which decides
    /// whether the run can continue.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.db);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| IngestError::Connection(e.to_string()))?;

        info!(host = %config.host, port = config.port, db = %config.db, "Connected to database");
        Ok(Self { pool, cursor: None })
    }

    /// Roll back anything pending and close the connection.
    pub async fn close(mut self) -> Result<()> {
        if let Some(cursor) = self.cursor.take() {
            let discarded = cursor.rollback().await?;
            debug!(discarded, "Rolled back open cursor on close");
        }
        self.pool.close().await;
        Ok(())
    }

    async fn cursor(&mut self) -> Result<&mut ContinuousCursor> {
        if self.cursor.is_none() {
            self.cursor = Some(ContinuousCursor::open(&self.pool).await?);
        }
        self.cursor
            .as_mut()
            .ok_or_else(|| IngestError::Config("continuous cursor unavailable".to_string()))
    }
}

#[async_trait]
impl Store for PgGateway {
    async fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        self.cursor().await?.execute(statement, params).await
    }

    async fn insert(
        &mut self,
        statement: &str,
        params: &[SqlValue],
        return_id: bool,
    ) -> Result<Option<i64>> {
        // Commits whatever the continuous cursor holds along with this row.
        let mut cursor = match self.cursor.take() {
            Some(cursor) => cursor,
            None => ContinuousCursor::open(&self.pool).await?,
        };

        let id = if return_id {
            cursor.fetch_id(statement, params).await?
        } else {
            cursor.execute(statement, params).await?;
            None
        };
        cursor.commit().await?;
        Ok(id)
    }

    async fn insert_continuous(
        &mut self,
        statement: &str,
        params: &[SqlValue],
        return_id: bool,
    ) -> Result<Option<i64>> {
        let cursor = self.cursor().await?;
        if return_id {
            cursor.fetch_id(statement, params).await
        } else {
            cursor.execute(statement, params).await?;
            Ok(None)
        }
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(cursor) = self.cursor.take() {
            let statements = cursor.commit().await?;
            debug!(statements, "Committed continuous cursor");
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(cursor) = self.cursor.take() {
            let statements = cursor.rollback().await?;
            debug!(statements, "Rolled back continuous cursor");
        }
        Ok(())
    }

    async fn query(&mut self, statement: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
        let rows = match self.cursor.as_mut() {
            Some(cursor) => cursor.fetch_all(statement, params).await?,
            None => bind_params(sqlx::query(statement), params)
                .fetch_all(&self.pool)
                .await
                .map_err(map_db_error)?,
        };
        rows.iter().map(decode_row).collect()
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Timestamp(v) => query.bind(timestamp_param(v)),
            SqlValue::Null => query.bind(Option::<String>::None),
        };
    }
    query
}

/// `recorded_at` is a `timestamp` column; bind the UTC wall-clock time so the
/// session `TimeZone` never shifts it.
fn timestamp_param(value: &DateTime<Utc>) -> NaiveDateTime {
    value.naive_utc()
}

fn map_db_error(error: sqlx::Error) -> IngestError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() {
            return IngestError::UniqueViolation(db_err.message().to_string());
        }
    }
    IngestError::Database(error)
}

/// Generated ids come back as `integer` or `bigint` depending on the schema.
fn first_column_id(row: &PgRow) -> Result<i64> {
    match row.try_get::<i64, _>(0) {
        Ok(id) => Ok(id),
        Err(_) => Ok(i64::from(row.try_get::<i32, _>(0)?)),
    }
}

fn decode_row(row: &PgRow) -> Result<Vec<SqlValue>> {
    row.columns()
        .iter()
        .map(|column| -> Result<SqlValue> {
            let i = column.ordinal();
            let value = match column.type_info().name() {
                "INT2" => row.try_get::<Option<i16>, _>(i)?.map(|v| SqlValue::Int(v.into())),
                "INT4" => row.try_get::<Option<i32>, _>(i)?.map(|v| SqlValue::Int(v.into())),
                "INT8" => row.try_get::<Option<i64>, _>(i)?.map(SqlValue::Int),
                "FLOAT4" => row.try_get::<Option<f32>, _>(i)?.map(|v| SqlValue::Float(v.into())),
                "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(SqlValue::Float),
                "TIMESTAMPTZ" => row
                    .try_get::<Option<DateTime<Utc>>, _>(i)?
                    .map(SqlValue::Timestamp),
                "TIMESTAMP" => row
                    .try_get::<Option<NaiveDateTime>, _>(i)?
                    .map(|v| SqlValue::Timestamp(v.and_utc())),
                _ => row.try_get::<Option<String>, _>(i)?.map(SqlValue::Text),
            };
            Ok(value.unwrap_or(SqlValue::Null))
        })
        .collect()
}
