//! Storage error types.

/// Errors raised by a [`StorageBackend`](crate::StorageBackend).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend could not be opened or connected to.
    #[error("failed to open storage at '{location}': {reason}")]
    Open { location: String, reason: String },

    #[error("failed to read key '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("failed to write key '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("failed to delete key '{key}': {reason}")]
    Delete { key: String, reason: String },

    #[error("failed to list keys with prefix '{prefix}': {reason}")]
    List { prefix: String, reason: String },

    /// A stored key was not valid UTF-8.
    #[error("invalid key encoding: {reason}")]
    InvalidKey { reason: String },
}
