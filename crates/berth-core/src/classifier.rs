//! Secret classification for environment variable keys.
//!
//! A key is considered sensitive when it contains any of a fixed set of
//! fragments, compared case-insensitively. This is a guard rail for the
//! editor (mask the value, flag it in the deployment env), not a security
//! boundary: a key that classifies as plain is not thereby safe to send in
//! the clear.

/// Lowercase fragments that mark a key as sensitive.
pub const SECRET_KEY_PATTERNS: [&str; 8] = [
    "secret",
    "password",
    "key",
    "token",
    "auth",
    "cert",
    "private",
    "credential",
];

/// Whether a variable with this key should be treated as a secret.
///
/// ```
/// use berth_core::is_secret_key;
///
/// assert!(is_secret_key("DB_PASSWORD"));
/// assert!(is_secret_key("stripe_api_Key"));
/// assert!(!is_secret_key("PORT"));
/// ```
#[must_use]
pub fn is_secret_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SECRET_KEY_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}
