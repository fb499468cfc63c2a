//! Login sessions.
//!
//! A session token is a UUID v4 handed to the browser once, in a cookie.
//! Only its SHA-256 hash is stored (`sessions/<hash>`), and the stored hash
//! is compared in constant time on lookup. The resolved [`Session`] is the
//! explicit identity every hierarchy call takes; nothing downstream reads
//! ambient auth state.

use std::sync::Arc;

use berth_storage::StorageBackend;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;

const SESSION_PREFIX: &str = "sessions/";

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "berth_session";

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token_hash: String,
    session: Session,
}

/// SHA-256 of a token, hex-encoded.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issues, resolves, and expires sessions.
pub struct SessionStore {
    storage: Arc<dyn StorageBackend>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session. Returns the plaintext token (never stored) and the
    /// session it resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] or [`SessionError::Serialization`].
    pub async fn issue(
        &self,
        user_id: Uuid,
        username: &str,
    ) -> Result<(String, Session), SessionError> {
        let token = Uuid::new_v4().to_string();
        let token_hash = hash_token(&token);
        let now = Utc::now();
        let session = Session {
            user_id,
            username: username.to_owned(),
            created_at: now,
            expires_at: now + self.ttl,
        };

        let record = StoredSession {
            token_hash: token_hash.clone(),
            session: session.clone(),
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| SessionError::Serialization {
            reason: e.to_string(),
        })?;
        self.storage
            .put(&format!("{SESSION_PREFIX}{token_hash}"), &bytes)
            .await?;

        info!(%user_id, expires_at = %session.expires_at, "session issued");
        Ok((token, session))
    }

    /// Resolve a plaintext token. Expired sessions are deleted on sight.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown tokens and
    /// [`SessionError::Expired`] for stale ones.
    pub async fn lookup(&self, token: &str) -> Result<Session, SessionError> {
        let token_hash = hash_token(token);
        let key = format!("{SESSION_PREFIX}{token_hash}");
        let record = self.read(&key).await?.ok_or(SessionError::NotFound)?;

        if !bool::from(record.token_hash.as_bytes().ct_eq(token_hash.as_bytes())) {
            return Err(SessionError::NotFound);
        }

        if record.session.is_expired_at(Utc::now()) {
            self.storage.delete(&key).await?;
            debug!(user_id = %record.session.user_id, "expired session removed on lookup");
            return Err(SessionError::Expired {
                expired_at: record.session.expires_at.to_rfc3339(),
            });
        }

        Ok(record.session)
    }

    /// End a session. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the delete fails.
    pub async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        let key = format!("{SESSION_PREFIX}{}", hash_token(token));
        self.storage.delete(&key).await?;
        Ok(())
    }

    /// Delete every session that expired before `now`. Unreadable records
    /// are deleted too. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if listing or deleting fails.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let mut removed = 0usize;
        for key in self.storage.list(SESSION_PREFIX).await? {
            let stale = match self.read(&key).await {
                Ok(Some(record)) => record.session.is_expired_at(now),
                Ok(None) => false,
                Err(SessionError::Serialization { reason }) => {
                    warn!(%key, %reason, "dropping unreadable session record");
                    true
                }
                Err(e) => return Err(e),
            };
            if stale {
                self.storage.delete(&key).await?;
                removed = removed.saturating_add(1);
            }
        }
        Ok(removed)
    }

    async fn read(&self, key: &str) -> Result<Option<StoredSession>, SessionError> {
        let Some(bytes) = self.storage.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SessionError::Serialization {
                reason: e.to_string(),
            })
    }
}
