//! Common types for meshcheck: host model, selectors, config objects and the
//! validation result model shared by the checkers and the graph appender.

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod host;
pub mod inventory;
pub mod labels;
pub mod mesh;
pub mod models;
pub mod object;
pub mod routes;
pub mod telemetry;
pub mod yaml;

pub use config::ValidationConfig;
pub use error::Error;
pub use host::Host;
pub use labels::{LabelSelector, Labels};
pub use models::{
    IstioCheck, IstioValidation, IstioValidationKey, IstioValidations, MessageKey, Severity,
    ValidationSummary,
};
pub use object::{ConfigObject, Lookup, ObjectMeta, ObjectType};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
