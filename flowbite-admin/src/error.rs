//! Error types for the admin layer

use thiserror::Error;

/// Admin error types
#[derive(Error, Debug)]
pub enum AdminError {
    /// Model not registered with the site
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// A standard filter parameter names a field the model does not declare
    #[error("Incorrect lookup parameter: {0}")]
    IncorrectLookupParameters(String),

    /// Route name unknown or called with the wrong number of arguments
    #[error("Reverse for '{0}' not found")]
    NoReverseMatch(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Underlying data store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Session storage failure
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        AdminError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for AdminError {
    fn from(err: toml::de::Error) -> Self {
        AdminError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AdminError {
    fn from(err: validator::ValidationErrors) -> Self {
        AdminError::Config(err.to_string())
    }
}

/// Result type for admin operations
pub type AdminResult<T> = Result<T, AdminError>;
