//! Persistence for hierarchy documents.
//!
//! Each session owner has one JSON document at `hierarchy/<user-id>` holding
//! their whole [`DomainHierarchy`] plus a revision counter. Writes are
//! whole-document, so an abandoned edit can never leave half a change
//! behind, and every save names the revision it was based on: if the stored
//! revision has moved, the save fails with [`StoreError::Conflict`] and the
//! caller decides whether to reload and retry or discard.
//!
//! Saves inside one process are serialized by a mutex, which makes the
//! check-then-write atomic for everything sharing this store.

use std::sync::Arc;

use berth_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::hierarchy::DomainHierarchy;
use crate::session::Session;

const HIERARCHY_PREFIX: &str = "hierarchy/";

/// A loaded hierarchy and the revision it was read at.
///
/// Revision 0 means nothing has been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub revision: u64,
    pub hierarchy: DomainHierarchy,
}

/// Loads and saves per-owner hierarchy documents.
pub struct HierarchyStore {
    storage: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for HierarchyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchyStore").finish_non_exhaustive()
    }
}

impl HierarchyStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Read the session owner's hierarchy. A missing document is an empty
    /// hierarchy at revision 0.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] or [`StoreError::Serialization`].
    pub async fn load(&self, session: &Session) -> Result<Snapshot, StoreError> {
        self.read(session.user_id).await
    }

    /// Write `hierarchy` if the stored revision still equals
    /// `expected_revision`. Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the document moved on, plus
    /// storage and serialization failures.
    pub async fn save(
        &self,
        session: &Session,
        expected_revision: u64,
        hierarchy: &DomainHierarchy,
    ) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read(session.user_id).await?.revision;
        self.write_checked(session.user_id, expected_revision, current, hierarchy)
            .await
    }

    /// Load, apply `edit` to a copy, and save the copy. If `edit` fails
    /// nothing is written. Returns the edit's output and the new revision.
    ///
    /// Holds the write lock for the whole cycle so edits through the same
    /// store never conflict with each other.
    ///
    /// # Errors
    ///
    /// Returns the edit's error, or a [`StoreError`] converted into `E`.
    pub async fn update<T, E, F>(&self, session: &Session, edit: F) -> Result<(T, u64), E>
    where
        F: FnOnce(&mut DomainHierarchy) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.write_lock.lock().await;
        let Snapshot {
            revision,
            mut hierarchy,
        } = self.read(session.user_id).await?;
        let output = edit(&mut hierarchy)?;
        let next = self
            .write_checked(session.user_id, revision, revision, &hierarchy)
            .await?;
        Ok((output, next))
    }

    async fn read(&self, owner: Uuid) -> Result<Snapshot, StoreError> {
        let Some(bytes) = self.storage.get(&document_key(owner)).await? else {
            return Ok(Snapshot {
                revision: 0,
                hierarchy: DomainHierarchy::new(),
            });
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
            reason: format!("hierarchy document for {owner}: {e}"),
        })
    }

    async fn write_checked(
        &self,
        owner: Uuid,
        expected: u64,
        current: u64,
        hierarchy: &DomainHierarchy,
    ) -> Result<u64, StoreError> {
        if current != expected {
            warn!(%owner, expected, actual = current, "stale hierarchy save rejected");
            return Err(StoreError::Conflict {
                expected,
                actual: current,
            });
        }

        let revision = current.saturating_add(1);
        let document = StoredRef {
            revision,
            hierarchy,
        };
        let bytes = serde_json::to_vec(&document).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;
        self.storage.put(&document_key(owner), &bytes).await?;

        debug!(%owner, revision, "hierarchy saved");
        Ok(revision)
    }
}

/// Borrowing twin of [`Snapshot`] so saves don't clone the tree.
#[derive(Serialize)]
struct StoredRef<'a> {
    revision: u64,
    hierarchy: &'a DomainHierarchy,
}

fn document_key(owner: Uuid) -> String {
    format!("{HIERARCHY_PREFIX}{owner}")
}
