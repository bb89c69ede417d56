//! Error types for artifact store operations

use homestead_core::CoreError;
use thiserror::Error;

/// Artifact store errors
#[derive(Debug, Error)]
pub enum StoreError {
    // ============ Origin Errors ============
    #[error("Origin not found: {origin}")]
    OriginNotFound { origin: String },

    #[error("Origin already exists: {origin}")]
    OriginExists { origin: String },

    #[error("Not authorized for origin '{origin}'")]
    Unauthorized { origin: String },

    // ============ Package Errors ============
    #[error("Package not found: {ident}{}", suggestion.as_ref().map(|s| format!(" (did you mean '{}'?)", s)).unwrap_or_default())]
    PackageNotFound {
        ident: String,
        suggestion: Option<String>,
    },

    #[error("Package already exists: {ident} ({target})")]
    PackageExists { ident: String, target: String },

    #[error("Package {ident} depends on {dependency}, which is not in the store")]
    MissingDependency { ident: String, dependency: String },

    #[error("Integrity check failed for {ident}: {files}")]
    IntegrityCheckFailed { ident: String, files: String },

    // ============ Channel Errors ============
    #[error("Channel '{channel}' does not exist for origin '{origin}'")]
    ChannelNotFound { origin: String, channel: String },

    #[error("Packages cannot be demoted from '{channel}'")]
    CannotDemote { channel: String },

    // ============ Config Errors ============
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Catalog Errors ============
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    // ============ Wrapped ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Catalog {
            message: e.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(e: serde_yaml::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
