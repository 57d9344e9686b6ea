use std::time::Duration;

use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{Sqlite, SqlitePoolOptions},
    Pool,
};

use crate::storage::StorageError;

pub type DbPool = Pool<Sqlite>;

pub async fn ensure_database_file(url: &str) -> Result<(), sqlx::Error> {
    let exists = Sqlite::database_exists(url).await?;

    if !exists {
        Sqlite::create_database(url).await?;
    }

    Ok(())
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    if is_in_memory(database_url) {
        // Every in-memory connection is its own database, so pin exactly one.
        return SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(database_url)
            .await;
    }

    ensure_database_file(database_url).await?;
    SqlitePoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Checks a table name against the identifier rules of the managed store:
/// 3 to 255 characters drawn from `[A-Za-z0-9_.-]`.
pub fn validate_table_name(name: &str) -> Result<(), StorageError> {
    let valid_len = (3..=255).contains(&name.len());
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(StorageError::InvalidTableName(name.to_string()))
    }
}

/// Creates the location table if it does not exist yet.
///
/// Rows are clustered on `(shipment_id, timestamp)`, which makes the table a
/// sorted key-value store: the composite primary key is the uniqueness
/// constraint for conditional puts and the index for descending range scans.
pub async fn ensure_table(pool: &DbPool, table: &str) -> Result<(), StorageError> {
    validate_table_name(table)?;

    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            shipment_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            record_id TEXT NOT NULL,
            order_id TEXT,
            logistic_id TEXT,
            plate_number TEXT,
            latitude REAL,
            longitude REAL,
            speed_kmh REAL,
            heading REAL,
            created_at TEXT NOT NULL,
            is_first_location INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (shipment_id, timestamp)
        ) WITHOUT ROWID
        "#
    );

    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_managed_store_style_names() {
        assert!(validate_table_name("test-shipment-trips").is_ok());
        assert!(validate_table_name("trips_v2.prod").is_ok());
    }

    #[test]
    fn rejects_names_that_would_break_quoting() {
        assert!(validate_table_name("ab").is_err());
        assert!(validate_table_name("trips\"; DROP TABLE x; --").is_err());
        assert!(validate_table_name("has space").is_err());
        assert!(validate_table_name(&"t".repeat(256)).is_err());
    }

    #[tokio::test]
    async fn in_memory_pool_shares_one_database() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        ensure_table(&pool, "trips").await.unwrap();

        // A second acquire must see the table created through the first.
        let count: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "trips""#)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn ensure_table_is_idempotent() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        ensure_table(&pool, "trips").await.unwrap();
        ensure_table(&pool, "trips").await.unwrap();
    }
}
