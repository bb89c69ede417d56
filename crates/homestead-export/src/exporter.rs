//! Exporter trait and the values passed through it

use homestead_core::Artifact;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::format::ExportFormat;

/// Input to an export: the package, its runtime closure and where to write
pub struct ExportContext {
    pub artifact: Artifact,
    /// Runtime dependencies in install order, excluding `artifact` itself
    pub closure: Vec<Artifact>,
    pub out_dir: PathBuf,
}

impl ExportContext {
    pub fn new(artifact: Artifact, closure: Vec<Artifact>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact,
            closure,
            out_dir: out_dir.into(),
        }
    }

    /// Every artifact to ship: dependencies first, then the package
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.closure.iter().chain(std::iter::once(&self.artifact))
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

/// Result of a single export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub format: ExportFormat,
    /// File or directory written
    pub path: PathBuf,
}

/// Converts an artifact into one deployable format
pub trait Exporter: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn export(&self, ctx: &ExportContext) -> Result<ExportOutput>;
}
