use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, TypeInfo, ValueRef};
use thiserror::Error;

use crate::db::{ensure_table, validate_table_name, DbPool};
use crate::models::{LocationProjection, LocationRecord, StoredRecord, StoredValue};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),
}

/// Failure of a conditional put.
#[derive(Debug, Error)]
pub enum WriteError {
    /// A record already exists at the target `(shipment_id, timestamp)` key.
    #[error("record already exists for shipment {shipment_id} at {timestamp}")]
    AlreadyExists { shipment_id: String, timestamp: i64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sqlx::Error> for WriteError {
    fn from(err: sqlx::Error) -> Self {
        WriteError::Storage(StorageError::Sql(err))
    }
}

/// The sorted key-value capabilities the tracking components are built on.
///
/// Records are keyed by `(shipment_id, timestamp)` and ordered by timestamp
/// within a shipment.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Writes `record` only if nothing exists at its key. Atomic: of any number
    /// of concurrent callers for the same key, exactly one succeeds.
    async fn conditional_put(&self, record: &LocationRecord) -> Result<(), WriteError>;

    /// Reads the record at `(shipment_id, timestamp)`, tolerating columns
    /// this service would never have written.
    async fn get(
        &self,
        shipment_id: &str,
        timestamp: i64,
    ) -> Result<Option<StoredRecord>, StorageError>;

    /// Returns at most `limit` projected records for the shipment, newest
    /// timestamp first.
    async fn query_descending(
        &self,
        shipment_id: &str,
        limit: u32,
    ) -> Result<Vec<LocationProjection>, StorageError>;
}

pub struct SqliteLocationStore {
    pool: DbPool,
    insert_sql: String,
    get_sql: String,
    window_sql: String,
}

impl SqliteLocationStore {
    /// Opens the store over `table`, creating the table when missing.
    pub async fn open(pool: DbPool, table: &str) -> Result<Self, StorageError> {
        ensure_table(&pool, table).await?;
        Self::new(pool, table)
    }

    /// Wraps an existing table without touching the schema.
    pub fn new(pool: DbPool, table: &str) -> Result<Self, StorageError> {
        validate_table_name(table)?;

        let insert_sql = format!(
            r#"INSERT INTO "{table}" (shipment_id, timestamp, record_id, order_id,
                logistic_id, plate_number, latitude, longitude, speed_kmh, heading,
                created_at, is_first_location)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(shipment_id, timestamp) DO NOTHING"#
        );
        let get_sql = format!(
            r#"SELECT shipment_id, timestamp, record_id, order_id, logistic_id, plate_number,
                latitude, longitude, speed_kmh, heading, created_at, is_first_location
             FROM "{table}" WHERE shipment_id = ? AND timestamp = ?"#
        );
        let window_sql = format!(
            r#"SELECT order_id, logistic_id, plate_number, timestamp,
                latitude, longitude, speed_kmh, heading
             FROM "{table}" WHERE shipment_id = ?
             ORDER BY timestamp DESC LIMIT ?"#
        );

        Ok(Self {
            pool,
            insert_sql,
            get_sql,
            window_sql,
        })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl LocationStore for SqliteLocationStore {
    async fn conditional_put(&self, record: &LocationRecord) -> Result<(), WriteError> {
        let result = sqlx::query(&self.insert_sql)
            .bind(&record.shipment_id)
            .bind(record.timestamp)
            .bind(&record.record_id)
            .bind(&record.order_id)
            .bind(&record.logistic_id)
            .bind(&record.plate_number)
            .bind(record.latitude)
            .bind(record.longitude)
            .bind(record.speed_kmh)
            .bind(record.heading)
            .bind(record.created_at)
            .bind(record.is_first_location)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(WriteError::AlreadyExists {
                shipment_id: record.shipment_id.clone(),
                timestamp: record.timestamp,
            });
        }

        Ok(())
    }

    async fn get(
        &self,
        shipment_id: &str,
        timestamp: i64,
    ) -> Result<Option<StoredRecord>, StorageError> {
        let row = sqlx::query(&self.get_sql)
            .bind(shipment_id)
            .bind(timestamp)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(StoredRecord {
            shipment_id: text_column(&row, "shipment_id")?.unwrap_or_default(),
            record_id: text_column(&row, "record_id")?,
            created_at: text_column(&row, "created_at")?,
            is_first_location: stored_value(&row, "is_first_location")?,
            location: projection(&row)?,
        }))
    }

    async fn query_descending(
        &self,
        shipment_id: &str,
        limit: u32,
    ) -> Result<Vec<LocationProjection>, StorageError> {
        let rows = sqlx::query(&self.window_sql)
            .bind(shipment_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let projections = rows
            .iter()
            .map(projection)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(projections)
    }
}

fn projection(row: &SqliteRow) -> Result<LocationProjection, sqlx::Error> {
    Ok(LocationProjection {
        order_id: text_column(row, "order_id")?,
        logistic_id: text_column(row, "logistic_id")?,
        plate_number: text_column(row, "plate_number")?,
        timestamp: stored_value(row, "timestamp")?,
        latitude: stored_value(row, "latitude")?,
        longitude: stored_value(row, "longitude")?,
        speed_kmh: stored_value(row, "speed_kmh")?,
        heading: stored_value(row, "heading")?,
    })
}

/// Reads a column by the storage class of its value rather than the declared
/// column type.
fn stored_value(row: &SqliteRow, column: &str) -> Result<StoredValue, sqlx::Error> {
    let kind = {
        let raw = row.try_get_raw(column)?;
        if raw.is_null() {
            return Ok(StoredValue::Null);
        }
        raw.type_info().name().to_string()
    };

    match kind.as_str() {
        "INTEGER" => Ok(StoredValue::Integer(row.try_get(column)?)),
        "REAL" => Ok(StoredValue::Real(row.try_get(column)?)),
        "TEXT" => Ok(StoredValue::Text(row.try_get(column)?)),
        _ => {
            let bytes: Vec<u8> = row.try_get(column)?;
            Ok(StoredValue::Text(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }
}

fn text_column(row: &SqliteRow, column: &str) -> Result<Option<String>, sqlx::Error> {
    Ok(match stored_value(row, column)? {
        StoredValue::Text(s) => Some(s),
        StoredValue::Integer(i) => Some(i.to_string()),
        StoredValue::Real(f) => Some(f.to_string()),
        StoredValue::Null => None,
    })
}
