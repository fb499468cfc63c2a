//! Shared application state for the Berth server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. Every store sits on the same storage backend.

use std::sync::Arc;

use berth_core::account::AccountStore;
use berth_core::session::{DEFAULT_SESSION_TTL_SECS, SessionStore};
use berth_core::store::HierarchyStore;
use berth_storage::StorageBackend;

use crate::config::ServerConfig;

/// Attributes of the session cookie that depend on deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_secs: i64,
}

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Registration and credential checks.
    pub accounts: AccountStore,
    /// Session issue, lookup, and expiry.
    pub sessions: SessionStore,
    /// Per-user hierarchy documents.
    pub hierarchy: HierarchyStore,
    pub cookie: CookieSettings,
}

impl AppState {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, config: &ServerConfig) -> Self {
        let ttl = chrono::Duration::try_seconds(config.session_ttl_secs)
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_SESSION_TTL_SECS));
        Self {
            accounts: AccountStore::new(Arc::clone(&storage)),
            sessions: SessionStore::new(Arc::clone(&storage), ttl),
            hierarchy: HierarchyStore::new(storage),
            cookie: CookieSettings {
                secure: config.secure_cookies,
                max_age_secs: config.session_ttl_secs,
            },
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cookie", &self.cookie)
            .finish_non_exhaustive()
    }
}
