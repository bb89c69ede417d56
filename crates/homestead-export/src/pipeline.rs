//! Export pipeline
//!
//! Dispatches an [`ExportContext`] to the exporters registered for the
//! requested formats.

use crate::error::{ExportError, Result};
use crate::exporter::{ExportContext, ExportOutput, Exporter};
use crate::format::ExportFormat;
use crate::kubernetes::KubernetesExporter;
use crate::oci::OciExporter;
use crate::tarball::TarExporter;

pub struct ExportPipeline {
    exporters: Vec<Box<dyn Exporter>>,
}

impl Default for ExportPipeline {
    /// Pipeline with the tar, OCI and Kubernetes exporters
    fn default() -> Self {
        let mut pipeline = Self::empty();
        pipeline.register(Box::new(TarExporter));
        pipeline.register(Box::new(OciExporter));
        pipeline.register(Box::new(KubernetesExporter::default()));
        pipeline
    }
}

impl ExportPipeline {
    /// Pipeline with no exporters
    pub fn empty() -> Self {
        Self {
            exporters: Vec::new(),
        }
    }

    /// Add an exporter, replacing any registered for the same format
    pub fn register(&mut self, exporter: Box<dyn Exporter>) {
        let format = exporter.format();
        self.exporters.retain(|e| e.format() != format);
        self.exporters.push(exporter);
    }

    pub fn formats(&self) -> Vec<ExportFormat> {
        self.exporters.iter().map(|e| e.format()).collect()
    }

    /// Run the exporter for a single format
    pub fn export(&self, ctx: &ExportContext, format: ExportFormat) -> Result<ExportOutput> {
        let exporter = self
            .exporters
            .iter()
            .find(|e| e.format() == format)
            .ok_or(ExportError::UnsupportedFormat { format })?;
        if ctx.out_dir().exists() && !ctx.out_dir().is_dir() {
            return Err(ExportError::OutputNotDirectory(ctx.out_dir().to_path_buf()));
        }

        tracing::info!(ident = %ctx.artifact.ident(), %format, "exporting");
        exporter.export(ctx)
    }

    /// Run every requested format in order, stopping at the first failure
    ///
    /// All formats are checked for a registered exporter before any output
    /// is written.
    pub fn run(&self, ctx: &ExportContext, formats: &[ExportFormat]) -> Result<Vec<ExportOutput>> {
        let registered = self.formats();
        if let Some(format) = formats.iter().find(|f| !registered.contains(f)) {
            return Err(ExportError::UnsupportedFormat { format: *format });
        }

        formats.iter().map(|f| self.export(ctx, *f)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use homestead_core::PackageTarget;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExporter {
        calls: Arc<AtomicUsize>,
    }

    impl Exporter for CountingExporter {
        fn format(&self) -> ExportFormat {
            ExportFormat::Tar
        }

        fn export(&self, ctx: &ExportContext) -> Result<ExportOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExportOutput {
                format: ExportFormat::Tar,
                path: ctx.out_dir().join("counted"),
            })
        }
    }

    #[test]
    fn test_default_registers_all_formats() {
        let formats = ExportPipeline::default().formats();
        for format in ExportFormat::ALL {
            assert!(formats.contains(&format));
        }
    }

    #[test]
    fn test_run_all_formats() {
        let fx = Fixture::new();
        let ctx = fx.redis_context(PackageTarget::X86_64Linux);
        let outputs = ExportPipeline::default()
            .run(&ctx, &ExportFormat::ALL)
            .unwrap();

        assert_eq!(outputs.len(), 3);
        for output in &outputs {
            assert!(output.path.exists(), "{} missing", output.path.display());
        }
        assert!(outputs[1].path.is_dir());
    }

    #[test]
    fn test_unsupported_format_writes_nothing() {
        let fx = Fixture::new();
        let ctx = fx.redis_context(PackageTarget::X86_64Linux);

        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = ExportPipeline::empty();
        pipeline.register(Box::new(CountingExporter {
            calls: calls.clone(),
        }));

        let err = pipeline
            .run(&ctx, &[ExportFormat::Tar, ExportFormat::Oci])
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::UnsupportedFormat {
                format: ExportFormat::Oci
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_output_must_be_directory() {
        let fx = Fixture::new();
        let mut ctx = fx.redis_context(PackageTarget::X86_64Linux);
        let file = fx.temp.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        ctx.out_dir = file;

        assert!(matches!(
            ExportPipeline::default().export(&ctx, ExportFormat::Tar),
            Err(ExportError::OutputNotDirectory(_))
        ));
    }

    #[test]
    fn test_register_replaces_same_format() {
        let fx = Fixture::new();
        let ctx = fx.redis_context(PackageTarget::X86_64Linux);

        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = ExportPipeline::default();
        pipeline.register(Box::new(CountingExporter {
            calls: calls.clone(),
        }));

        assert_eq!(pipeline.formats().len(), 3);
        let output = pipeline.export(&ctx, ExportFormat::Tar).unwrap();
        assert!(output.path.ends_with("counted"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
