use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, trace};

use crate::error::{VigilError, VigilResult};

/// Counts records held by the assistant's conversation memory store.
pub trait RecordCounter: Send + Sync {
    fn count_records(&self) -> VigilResult<u64>;
}

/// Row count of one table in a SQLite memory store.
///
/// `count_records` blocks on the runtime the counter was created on, so it
/// must be called from outside that runtime's worker threads (the monitor
/// thread, or `spawn_blocking`).
pub struct SqliteRecordCounter {
    pool: SqlitePool,
    table: String,
    handle: Handle,
}

impl SqliteRecordCounter {
    pub async fn connect(url: &str, table: &str) -> VigilResult<Self> {
        validate_table_name(table)?;

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        info!(url = %url, table = %table, "Connected to memory store");

        Ok(Self {
            pool,
            table: table.to_string(),
            handle: Handle::current(),
        })
    }

    pub fn from_pool(pool: SqlitePool, table: &str, handle: Handle) -> VigilResult<Self> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
            handle,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count_records_async(&self) -> VigilResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        trace!(table = %self.table, count = count, "Counted memory records");
        Ok(count.max(0) as u64)
    }
}

impl RecordCounter for SqliteRecordCounter {
    fn count_records(&self) -> VigilResult<u64> {
        self.handle.block_on(self.count_records_async())
    }
}

fn validate_table_name(table: &str) -> VigilResult<()> {
    let mut chars = table.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(VigilError::validation(
            "Table name must be a plain SQL identifier",
            "memory_table",
            table,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("conversations").is_ok());
        assert!(validate_table_name("_memory_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2fast").is_err());
        assert!(validate_table_name("x; DROP TABLE y").is_err());
    }

    #[test]
    fn test_counts_rows_from_outside_the_runtime() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("memory.db").display());
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        let counter = runtime.block_on(async {
            let counter = SqliteRecordCounter::connect(&url, "conversations")
                .await
                .unwrap();
            sqlx::query("CREATE TABLE conversations (id INTEGER PRIMARY KEY, body TEXT)")
                .execute(counter.pool())
                .await
                .unwrap();
            for body in ["hello", "world", "again"] {
                sqlx::query("INSERT INTO conversations (body) VALUES (?)")
                    .bind(body)
                    .execute(counter.pool())
                    .await
                    .unwrap();
            }
            counter
        });

        assert_eq!(counter.count_records().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("empty.db").display());
        let counter = SqliteRecordCounter::connect(&url, "conversations")
            .await
            .unwrap();

        let err = counter.count_records_async().await.unwrap_err();
        assert!(matches!(err, VigilError::Database(_)));
    }
}
