//! Vault error types

use homestead_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid secret name '{name}': {reason}")]
    InvalidSecretName { name: String, reason: String },

    #[error("Secret '{name}' already exists in origin '{origin}'; delete it first")]
    SecretExists { origin: String, name: String },

    #[error("Secret '{name}' not found in origin '{origin}'")]
    SecretNotFound { origin: String, name: String },

    #[error("Not authorized for origin '{origin}'")]
    Unauthorized { origin: String },

    #[error("Origin not found: {origin}")]
    OriginNotFound { origin: String },

    #[error("Key for origin '{key_origin}' cannot open secrets of origin '{origin}'")]
    KeyMismatch { origin: String, key_origin: String },

    #[error("Failed to seal secret: {message}")]
    Seal { message: String },

    #[error("Failed to open secret '{name}': {message}")]
    Open { name: String, message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;
