//! Storage backend abstraction for Berth.
//!
//! The [`StorageBackend`] trait is a plain key-value interface. It knows
//! nothing about projects, resources, or sessions: `berth-core` serializes
//! its documents to JSON and hands the bytes to whichever backend the server
//! was configured with.
//!
//! Backends:
//!
//! - [`MemoryBackend`]: in-memory, the default for development and tests
//! - [`RocksDbBackend`]: embedded persistent store (feature `rocksdb-backend`)
//! - [`PostgresBackend`]: shared database for multi-instance deployments
//!   (feature `postgres-backend`)

mod error;
mod memory;
#[cfg(feature = "postgres-backend")]
mod postgres_backend;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;

pub use error::StorageError;
pub use memory::MemoryBackend;
#[cfg(feature = "postgres-backend")]
pub use postgres_backend::PostgresBackend;
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDbBackend;

/// A pluggable key-value storage backend.
///
/// Keys are UTF-8 strings using `/` as a separator (for example
/// `hierarchy/<user-id>` or `sessions/<token-hash>`). Values are opaque
/// bytes.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Fetch the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the backend fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List keys starting with `prefix`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] if the backend fails.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
