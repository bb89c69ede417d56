//! Build error types

use homestead_core::CoreError;
use homestead_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build requires secret '{name}' which is not set for the origin")]
    MissingSecret { name: String },

    #[error("Build script failed ({})", exit_description(.code))]
    BuildFailed { code: Option<i32> },

    #[error("Value of secret '{name}' was written into the package at {path}")]
    SecretLeaked { name: String, path: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
