//! User accounts: registration rules and credential checks.
//!
//! Registration validates every field and reports all violations at once.
//! Passwords are stored as `SHA-256(salt || password)` with a per-user
//! random salt and compared in constant time. Records live at
//! `users/<lowercased username>`, which also makes usernames unique without
//! regard to case.

use std::fmt;
use std::sync::Arc;

use berth_storage::StorageBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::{AccountError, FieldViolation};

const USER_PREFIX: &str = "users/";

/// Characters that satisfy the "special character" password rule.
pub const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// Sign-up form as submitted.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("full_name", &self.full_name)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Registration {
    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Invalid`] listing each failed rule.
    pub fn validate(&self) -> Result<(), AccountError> {
        let mut violations = Vec::new();
        let mut fail = |field, message| violations.push(FieldViolation { field, message });

        if self.full_name.chars().count() < 2 {
            fail("fullName", "Full name must be at least 2 characters");
        }

        if self.username.chars().count() < 3 {
            fail("username", "Username must be at least 3 characters");
        } else if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            fail("username", "Invalid username format");
        }

        if !is_valid_email(&self.email) {
            fail("email", "Invalid email address");
        }

        if self.password.chars().count() < 8 {
            fail("password", "Password must be at least 8 characters");
        }
        if !is_strong_password(&self.password) {
            fail(
                "password",
                "Password must contain uppercase, lowercase, number and special character",
            );
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(AccountError::Invalid(violations))
        }
    }
}

fn is_strong_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// `local@domain.tld`, no whitespace, no empty labels.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|l| !l.is_empty())
        && labels.last().is_some_and(|tld| tld.chars().count() >= 2)
}

/// Stored account.
#[derive(Clone, Serialize, Deserialize)]
struct UserRecord {
    id: Uuid,
    full_name: String,
    username: String,
    email: String,
    password_salt: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserProfile {
    fn from(r: UserRecord) -> Self {
        Self {
            id: r.id,
            full_name: r.full_name,
            username: r.username,
            email: r.email,
            created_at: r.created_at,
        }
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn user_key(username: &str) -> String {
    format!("{USER_PREFIX}{}", username.to_lowercase())
}

/// Registers users and checks credentials.
pub struct AccountStore {
    storage: Arc<dyn StorageBackend>,
    register_lock: Mutex<()>,
}

impl fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountStore").finish_non_exhaustive()
    }
}

impl AccountStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            register_lock: Mutex::new(()),
        }
    }

    /// Validate and create an account.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Invalid`] for rule violations,
    /// [`AccountError::UsernameTaken`] for an existing username, and
    /// storage failures.
    pub async fn register(&self, form: Registration) -> Result<UserProfile, AccountError> {
        form.validate()?;

        let _guard = self.register_lock.lock().await;
        let key = user_key(&form.username);
        if self.storage.get(&key).await?.is_some() {
            return Err(AccountError::UsernameTaken {
                username: form.username,
            });
        }

        let salt = Uuid::new_v4().simple().to_string();
        let record = UserRecord {
            id: Uuid::new_v4(),
            password_hash: hash_password(&salt, &form.password),
            password_salt: salt,
            full_name: form.full_name.trim().to_owned(),
            username: form.username,
            email: form.email,
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| AccountError::Serialization {
            reason: e.to_string(),
        })?;
        self.storage.put(&key, &bytes).await?;

        info!(user_id = %record.id, username = %record.username, "user registered");
        Ok(record.into())
    }

    /// Check a username/password pair.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidCredentials`] for an unknown user or a
    /// wrong password alike.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserProfile, AccountError> {
        let record = self
            .read(username)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        let candidate = hash_password(&record.password_salt, password);
        if bool::from(candidate.as_bytes().ct_eq(record.password_hash.as_bytes())) {
            Ok(record.into())
        } else {
            Err(AccountError::InvalidCredentials)
        }
    }

    /// Look up a profile by username.
    ///
    /// # Errors
    ///
    /// Returns storage and serialization failures.
    pub async fn find(&self, username: &str) -> Result<Option<UserProfile>, AccountError> {
        Ok(self.read(username).await?.map(UserProfile::from))
    }

    async fn read(&self, username: &str) -> Result<Option<UserRecord>, AccountError> {
        let Some(bytes) = self.storage.get(&user_key(username)).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AccountError::Serialization {
                reason: e.to_string(),
            })
    }
}
