//! Export error types

use homestead_core::{CoreError, PackageTarget};
use std::path::PathBuf;
use thiserror::Error;

use crate::format::ExportFormat;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unknown export format '{name}' (expected one of: tar, oci, kubernetes)")]
    UnknownFormat { name: String },

    #[error("No exporter registered for format '{format}'")]
    UnsupportedFormat { format: ExportFormat },

    #[error("Format '{format}' cannot export packages built for {target}")]
    UnsupportedTarget {
        format: ExportFormat,
        target: PackageTarget,
    },

    #[error("Output path is not a directory: {0}")]
    OutputNotDirectory(PathBuf),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
