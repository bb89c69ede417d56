//! Homestead Export - turn signed artifacts into deployable formats
//!
//! An [`ExportContext`] carries an opened artifact together with its runtime
//! closure. Each [`Exporter`] renders that into one [`ExportFormat`]:
//!
//! - `tar`: a gzipped tarball laid out as `hs/pkgs/<origin>/<name>/<version>/<release>/`
//! - `oci`: an OCI image layout directory with a single rootfs layer
//! - `kubernetes`: a Deployment, plus a Service for exposed ports
//!
//! [`ExportPipeline`] dispatches to the registered exporters.

pub mod error;
pub mod exporter;
pub mod format;
pub mod kubernetes;
pub mod oci;
pub mod pipeline;
pub mod rootfs;
pub mod tarball;

#[cfg(test)]
mod testutil;

pub use error::{ExportError, Result};
pub use exporter::{ExportContext, ExportOutput, Exporter};
pub use format::ExportFormat;
pub use kubernetes::KubernetesExporter;
pub use oci::{OciExporter, image_reference};
pub use pipeline::ExportPipeline;
pub use tarball::TarExporter;
