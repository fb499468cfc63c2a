//! `RocksDB` storage backend.
//!
//! `RocksDB` is synchronous, so every call is shipped to Tokio's blocking
//! pool. Keys are opaque UTF-8 strings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options};

use crate::{StorageBackend, StorageError};

type Db = DBWithThreadMode<MultiThreaded>;

/// Embedded persistent backend.
///
/// ```no_run
/// # use berth_storage::RocksDbBackend;
/// let backend = RocksDbBackend::open("/var/lib/berth/data")?;
/// # Ok::<(), berth_storage::StorageError>(())
/// ```
#[derive(Clone)]
pub struct RocksDbBackend {
    db: Arc<Db>,
    path: PathBuf,
}

impl std::fmt::Debug for RocksDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RocksDbBackend {
    /// Open (or create) a database directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if `RocksDB` refuses the path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = Db::open(&opts, path).map_err(|e| StorageError::Open {
            location: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the database on the blocking pool. A panicked task
    /// is reported through `on_join_error` so each operation keeps its own
    /// error variant.
    async fn run_blocking<T, F>(
        &self,
        op: F,
        on_join_error: impl FnOnce(String) -> StorageError,
    ) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Db) -> Result<T, StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(db.as_ref()))
            .await
            .map_err(|e| on_join_error(format!("blocking task failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl StorageBackend for RocksDbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let owned = key.to_owned();
        let err_key = key.to_owned();
        self.run_blocking(
            move |db| {
                db.get(owned.as_bytes()).map_err(|e| StorageError::Read {
                    key: owned,
                    reason: e.to_string(),
                })
            },
            |reason| StorageError::Read { key: err_key, reason },
        )
        .await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let owned = key.to_owned();
        let err_key = key.to_owned();
        let value = value.to_vec();
        self.run_blocking(
            move |db| {
                db.put(owned.as_bytes(), &value)
                    .map_err(|e| StorageError::Write {
                        key: owned,
                        reason: e.to_string(),
                    })
            },
            |reason| StorageError::Write { key: err_key, reason },
        )
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let owned = key.to_owned();
        let err_key = key.to_owned();
        self.run_blocking(
            move |db| {
                db.delete(owned.as_bytes())
                    .map_err(|e| StorageError::Delete {
                        key: owned,
                        reason: e.to_string(),
                    })
            },
            |reason| StorageError::Delete { key: err_key, reason },
        )
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let owned = prefix.to_owned();
        let err_prefix = prefix.to_owned();
        self.run_blocking(
            move |db| {
                let mut keys = Vec::new();
                let iter = db.iterator(IteratorMode::From(owned.as_bytes(), Direction::Forward));
                for item in iter {
                    let (raw, _) = item.map_err(|e| StorageError::List {
                        prefix: owned.clone(),
                        reason: e.to_string(),
                    })?;
                    let key = String::from_utf8(raw.to_vec()).map_err(|e| {
                        StorageError::InvalidKey {
                            reason: e.to_string(),
                        }
                    })?;
                    if !key.starts_with(&owned) {
                        break;
                    }
                    keys.push(key);
                }
                Ok(keys)
            },
            |reason| StorageError::List {
                prefix: err_prefix,
                reason,
            },
        )
        .await
    }
}
