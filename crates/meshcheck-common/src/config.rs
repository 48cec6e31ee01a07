//! Engine configuration
//!
//! Label names and the mesh root namespace are deployment choices, so they
//! travel as an explicit [`ValidationConfig`] value into every component that
//! needs them.

use serde::{Deserialize, Serialize};

use crate::mesh::{
    DEFAULT_APP_LABEL, DEFAULT_CLUSTER_NAME, DEFAULT_ROOT_NAMESPACE, DEFAULT_VERSION_LABEL,
};
use crate::{yaml, Error, Result};

/// Configuration of a validation pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationConfig {
    /// Namespace holding mesh-wide policy objects
    pub root_namespace: String,
    /// Cluster name given to objects that do not carry one
    pub cluster_name: String,
    /// Label key naming an application on workloads and services
    pub app_label: String,
    /// Label key naming an application version
    pub version_label: String,
    /// Number of threads computing per-object checks (1 = sequential)
    pub workers: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            root_namespace: DEFAULT_ROOT_NAMESPACE.to_string(),
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            app_label: DEFAULT_APP_LABEL.to_string(),
            version_label: DEFAULT_VERSION_LABEL.to_string(),
            workers: 1,
        }
    }
}

impl ValidationConfig {
    /// Parse a configuration from YAML, filling unset fields with defaults
    pub fn from_yaml(input: &str) -> Result<Self> {
        let value = yaml::parse_yaml(input)?;
        let config: Self = if value.is_null() {
            Self::default()
        } else {
            serde_json::from_value(value)
                .map_err(|e| Error::serialization_for_kind("ValidationConfig", e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check field constraints
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config_field("workers", "must be at least 1"));
        }
        if self.app_label.is_empty() {
            return Err(Error::config_field("appLabel", "must not be empty"));
        }
        if self.root_namespace.is_empty() {
            return Err(Error::config_field("rootNamespace", "must not be empty"));
        }
        Ok(())
    }

    /// Set the number of worker threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}
