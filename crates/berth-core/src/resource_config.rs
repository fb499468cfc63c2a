//! Per-resource configuration.
//!
//! A [`ResourceConfig`] ties one [`VariableSet`] to the resource that owns
//! it and flattens it into the plain key → value map a deployment consumes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::variables::VariableSet;

/// The variables of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    resource_id: Uuid,
    variables: VariableSet,
}

/// Flattened configuration handed to a deployment.
///
/// Secret flags travel separately from the values so a consumer can mask or
/// audit them without re-running classification.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEnv {
    pub variables: BTreeMap<String, String>,
    pub secret_keys: BTreeSet<String>,
}

// Keys only; values stay out of logs.
impl fmt::Debug for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentEnv")
            .field("keys", &self.variables.keys().collect::<Vec<_>>())
            .field("secret_keys", &self.secret_keys)
            .finish()
    }
}

impl ResourceConfig {
    /// An empty configuration for a newly created resource.
    #[must_use]
    pub fn new(resource_id: Uuid) -> Self {
        Self {
            resource_id,
            variables: VariableSet::new(),
        }
    }

    #[must_use]
    pub fn resource_id(&self) -> Uuid {
        self.resource_id
    }

    /// The current snapshot. Cloning it is cheap.
    #[must_use]
    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    /// Replace the whole set.
    pub fn set_variables(&mut self, variables: VariableSet) {
        self.variables = variables;
    }

    /// Ready for deployment once any variable has a key.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.variables.has_configured_key()
    }

    /// Flatten to key → value, skipping records whose key is still empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateKey`] for the first key that appears
    /// twice.
    pub fn serialize(&self) -> Result<DeploymentEnv, ConfigError> {
        let mut env = DeploymentEnv::default();
        for var in self.variables.iter().filter(|v| !v.key.is_empty()) {
            if env
                .variables
                .insert(var.key.clone(), var.value.clone())
                .is_some()
            {
                return Err(ConfigError::DuplicateKey {
                    key: var.key.clone(),
                });
            }
            if var.is_secret {
                env.secret_keys.insert(var.key.clone());
            }
        }
        Ok(env)
    }
}
