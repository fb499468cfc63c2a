//! Core library for Berth.
//!
//! Holds the project → environment → resource hierarchy, the environment
//! variable sets attached to resources, the heuristic that flags sensitive
//! variable keys, and the persistence, account, and session stores the HTTP
//! server is built on. Storage is reached only through the
//! `berth_storage::StorageBackend` trait.

pub mod account;
pub mod classifier;
pub mod error;
pub mod hierarchy;
pub mod resource_config;
pub mod session;
pub mod store;
pub mod variables;

pub use classifier::is_secret_key;
pub use hierarchy::{DomainHierarchy, ResourceState};
pub use resource_config::{DeploymentEnv, ResourceConfig};
pub use variables::{EnvironmentVariable, VariableDraft, VariableSet, VariableUpdate};
