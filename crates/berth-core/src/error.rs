//! Error types for `berth-core`.
//!
//! One enum per concern. Messages name the offending field, id, or key but
//! never include variable values or passwords.

use berth_storage::StorageError;

/// Errors from hierarchy mutations and lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// A required field was empty or otherwise unusable.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// An id did not resolve to a node of the expected kind.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl HierarchyError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Errors from flattening a resource configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Two variables share a key, so the deployment env would be ambiguous.
    #[error("duplicate variable key '{key}'")]
    DuplicateKey { key: String },
}

/// Errors from the hierarchy document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The stored document moved on since the caller loaded it.
    #[error("hierarchy was modified concurrently: expected revision {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// A stored document could not be encoded or decoded.
    #[error("document serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("store backend error: {0}")]
    Storage(#[from] StorageError),
}

/// A single failed registration rule.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: &'static str,
}

/// Errors from account registration and credential checks.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// One or more registration fields failed validation.
    #[error("invalid registration: {}", summarize(.0))]
    Invalid(Vec<FieldViolation>),

    /// The username is already registered.
    #[error("username '{username}' is already taken")]
    UsernameTaken { username: String },

    /// Unknown username or wrong password. Deliberately indistinguishable.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("account record serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("account storage error: {0}")]
    Storage(#[from] StorageError),
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from session issuance and lookup.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session matches the presented token.
    #[error("session not found")]
    NotFound,

    /// The session existed but its lifetime has passed.
    #[error("session expired at {expired_at}")]
    Expired { expired_at: String },

    #[error("session record serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("session storage error: {0}")]
    Storage(#[from] StorageError),
}
