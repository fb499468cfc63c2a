//! Server configuration for Berth.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `BERTH_*` environment variables.

use std::net::SocketAddr;

use berth_core::session::DEFAULT_SESSION_TTL_SECS;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3001";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Origins the dashboard may call from with credentials.
    pub allowed_origins: Vec<String>,
    /// Session lifetime in seconds.
    pub session_ttl_secs: i64,
    /// Seconds between expired-session sweeps.
    pub session_sweep_interval_secs: u64,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
}

/// Supported storage backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// `RocksDB` persistent storage.
    RocksDb { path: String },
    /// PostgreSQL persistent storage.
    Postgres { url: String },
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on (binds to `0.0.0.0`)
    /// - `BERTH_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:3000`)
    /// - `BERTH_STORAGE`: `memory`, `rocksdb`, or `postgres` (default: `memory`)
    /// - `BERTH_STORAGE_PATH`: path for `RocksDB` (default: `./data`)
    /// - `DATABASE_URL`: PostgreSQL connection string (used when `BERTH_STORAGE=postgres`)
    /// - `BERTH_LOG_LEVEL`: log filter (default: `info`)
    /// - `BERTH_ALLOWED_ORIGINS`: comma-separated CORS origins (default: `http://localhost:3001`)
    /// - `BERTH_SESSION_TTL_SECS`: session lifetime (default: `86400`)
    /// - `BERTH_SESSION_SWEEP_INTERVAL`: seconds between session sweeps (default: `300`)
    /// - `BERTH_ENV`: `production` makes the session cookie `Secure`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        // Priority: BERTH_BIND_ADDR > PORT > default 127.0.0.1:3000
        let bind_addr = if let Some(addr) = var("BERTH_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
        } else if let Some(port_str) = var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(DEFAULT_PORT);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
        };

        let storage_path = var("BERTH_STORAGE_PATH").unwrap_or_else(|| "./data".to_owned());

        let storage_backend = match var("BERTH_STORAGE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "rocksdb" => StorageBackendType::RocksDb { path: storage_path },
            "postgres" | "postgresql" => {
                let url = var("DATABASE_URL")
                    .unwrap_or_else(|| "postgres://localhost/berth".to_owned());
                StorageBackendType::Postgres { url }
            }
            _ => StorageBackendType::Memory,
        };

        let log_level = var("BERTH_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let allowed_origins = var("BERTH_ALLOWED_ORIGINS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_ALLOWED_ORIGIN.to_owned()]);

        let session_ttl_secs = var("BERTH_SESSION_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs: &i64| *secs > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);

        let session_sweep_interval_secs = var("BERTH_SESSION_SWEEP_INTERVAL")
            .and_then(|v| v.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .unwrap_or(300);

        let secure_cookies = var("BERTH_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"));

        Self {
            bind_addr,
            storage_backend,
            log_level,
            allowed_origins,
            session_ttl_secs,
            session_sweep_interval_secs,
            secure_cookies,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]);
        assert_eq!(c.bind_addr, SocketAddr::from(([127, 0, 0, 1], 3000)));
        assert_eq!(c.storage_backend, StorageBackendType::Memory);
        assert_eq!(c.log_level, "info");
        assert_eq!(c.allowed_origins, ["http://localhost:3001"]);
        assert_eq!(c.session_ttl_secs, 86_400);
        assert_eq!(c.session_sweep_interval_secs, 300);
        assert!(!c.secure_cookies);
    }

    #[test]
    fn bind_addr_beats_port() {
        let c = config(&[("BERTH_BIND_ADDR", "10.0.0.1:9000"), ("PORT", "8080")]);
        assert_eq!(c.bind_addr, SocketAddr::from(([10, 0, 0, 1], 9000)));

        let c = config(&[("PORT", "8080")]);
        assert_eq!(c.bind_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
    }

    #[test]
    fn storage_selection() {
        let c = config(&[("BERTH_STORAGE", "RocksDB"), ("BERTH_STORAGE_PATH", "/var/berth")]);
        assert_eq!(
            c.storage_backend,
            StorageBackendType::RocksDb {
                path: "/var/berth".to_owned()
            }
        );

        let c = config(&[("BERTH_STORAGE", "postgres"), ("DATABASE_URL", "postgres://db/x")]);
        assert_eq!(
            c.storage_backend,
            StorageBackendType::Postgres {
                url: "postgres://db/x".to_owned()
            }
        );
    }

    #[test]
    fn origins_are_trimmed_and_split() {
        let c = config(&[(
            "BERTH_ALLOWED_ORIGINS",
            " https://app.example.com, http://localhost:3001 ,,",
        )]);
        assert_eq!(
            c.allowed_origins,
            ["https://app.example.com", "http://localhost:3001"]
        );

        let c = config(&[("BERTH_ALLOWED_ORIGINS", " , ")]);
        assert_eq!(c.allowed_origins, ["http://localhost:3001"]);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let c = config(&[
            ("BERTH_SESSION_TTL_SECS", "-5"),
            ("BERTH_SESSION_SWEEP_INTERVAL", "soon"),
        ]);
        assert_eq!(c.session_ttl_secs, 86_400);
        assert_eq!(c.session_sweep_interval_secs, 300);
    }

    #[test]
    fn production_enables_secure_cookies() {
        assert!(config(&[("BERTH_ENV", "production")]).secure_cookies);
        assert!(!config(&[("BERTH_ENV", "development")]).secure_cookies);
    }
}
