//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid package identifier '{ident}': {reason}")]
    InvalidIdent { ident: String, reason: String },

    #[error("Package identifier '{ident}' must be fully qualified (origin/name/version/release)")]
    NotFullyQualified { ident: String },

    #[error("Invalid channel name '{name}'")]
    InvalidChannel { name: String },

    #[error("Unknown package target '{target}'")]
    InvalidTarget { target: String },

    #[error("Invalid artifact: {message}")]
    InvalidArtifact { message: String },

    #[error("Symlink '{path}' points outside the package prefix: {target}")]
    UnsafeSymlink { path: String, target: String },

    #[error("Invalid MANIFEST: {message}")]
    InvalidManifest { message: String },

    #[error("Signature verification failed for artifact signed by '{signer}': {message}")]
    BadSignature { signer: String, message: String },

    #[error("No {kind} key found for origin '{origin}'")]
    KeyNotFound { origin: String, kind: String },

    #[error("Signing key for origin '{origin}' is password protected")]
    KeyLocked { origin: String },

    #[error("Invalid {kind} key: {message}")]
    InvalidKey { kind: String, message: String },

    #[error("Plan not found: {path}")]
    PlanNotFound { path: String },

    #[error("Invalid plan: {message}")]
    InvalidPlan { message: String },

    #[error("Failed to parse plan.yaml: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
