//! `PostgreSQL` storage backend.
//!
//! One `berth_documents` table holds every key. Use this when several
//! server instances must share state; sqlx is fully async so no blocking
//! pool is involved.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::{StorageBackend, StorageError};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS berth_documents (\
        key   TEXT  PRIMARY KEY, \
        value BYTEA NOT NULL\
    )";

const CREATE_PREFIX_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_berth_documents_prefix \
     ON berth_documents (key text_pattern_ops)";

/// Backend over a `PgPool`.
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend").finish_non_exhaustive()
    }
}

impl PostgresBackend {
    /// Connect and create the documents table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if connecting or the migration fails.
    /// The connection string is never echoed back in the error.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let open_err = |reason: String| StorageError::Open {
            location: "postgres".to_owned(),
            reason,
        };

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| open_err(e.to_string()))?;

        for statement in [CREATE_TABLE, CREATE_PREFIX_INDEX] {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| open_err(format!("migration failed: {e}")))?;
        }

        info!("postgres documents table ready");
        Ok(Self { pool })
    }
}

/// Escape `LIKE` metacharacters so a prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait::async_trait]
impl StorageBackend for PostgresBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT value FROM berth_documents WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::Read {
                    key: key.to_owned(),
                    reason: e.to_string(),
                })?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO berth_documents (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Write {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM berth_documents WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT key FROM berth_documents WHERE key LIKE $1 ESCAPE '\\' ORDER BY key",
        )
        .bind(like_prefix(prefix))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::List {
            prefix: prefix.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}
