//! Error types for meshcheck
//!
//! Validation findings are never errors: they are the product of a check pass
//! and travel as [`crate::models::IstioCheck`] values. The variants here cover
//! the operational edges only: loading snapshots and configuration.

use thiserror::Error;

/// Main error type for meshcheck operations
#[derive(Debug, Error)]
pub enum Error {
    /// YAML input could not be parsed
    #[error("yaml error: {message}")]
    Yaml {
        /// Parser message
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being (de)serialized (if known)
        kind: Option<String>,
    },

    /// A snapshot document lacks the identity fields every object needs
    #[error("invalid {kind} object: {message}")]
    InvalidObject {
        /// Resource kind of the offending document
        kind: String,
        /// Description of what is missing
        message: String,
    },

    /// Invalid engine configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
        /// The invalid field (e.g. "workers")
        field: Option<String>,
    },
}

impl Error {
    /// Create a YAML error with the given message
    pub fn yaml(msg: impl Into<String>) -> Self {
        Self::Yaml {
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an invalid-object error for a resource kind
    pub fn invalid_object(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidObject {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error pointing at a field
    pub fn config_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            field: Some(field.into()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(err.to_string())
    }
}
