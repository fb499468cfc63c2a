//! Berth HTTP server.
//!
//! Wires the core library and a storage backend into an Axum JSON API for
//! accounts, the project → environment → resource hierarchy, and the
//! environment variables attached to each resource.

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;
