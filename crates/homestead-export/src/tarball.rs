//! Gzipped tarball export

use crate::error::Result;
use crate::exporter::{ExportContext, ExportOutput, Exporter};
use crate::format::ExportFormat;
use crate::rootfs;

/// Writes `<ident>-<target>.tar.gz` holding the package and its closure
#[derive(Debug, Default, Clone, Copy)]
pub struct TarExporter;

impl Exporter for TarExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Tar
    }

    fn export(&self, ctx: &ExportContext) -> Result<ExportOutput> {
        let ident = ctx.artifact.ident();
        let path = ctx
            .out_dir()
            .join(format!("{}-{}.tar.gz", ident.dashed(), ctx.artifact.target()));

        let tarball = rootfs::gzip(&rootfs::rootfs_tar(ctx)?)?;
        std::fs::create_dir_all(ctx.out_dir())?;
        std::fs::write(&path, tarball)?;

        tracing::debug!(%ident, path = %path.display(), "exported tarball");
        Ok(ExportOutput {
            format: ExportFormat::Tar,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use flate2::read::GzDecoder;
    use homestead_core::PackageTarget;
    use std::io::Read;
    use tar::Archive;

    fn entries(path: &std::path::Path) -> Vec<(String, u64, String)> {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        archive
            .entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let name = e.path().unwrap().to_string_lossy().into_owned();
                let mtime = e.header().mtime().unwrap();
                let mut content = String::new();
                e.read_to_string(&mut content).unwrap();
                (name, mtime, content)
            })
            .collect()
    }

    #[test]
    fn test_tarball_contains_closure() {
        let fx = Fixture::new();
        let ctx = fx.redis_context(PackageTarget::X86_64Linux);
        let output = TarExporter.export(&ctx).unwrap();

        assert_eq!(output.format, ExportFormat::Tar);
        assert_eq!(
            output.path.file_name().unwrap().to_string_lossy(),
            "core-redis-7.2.4-20240101120000-x86_64-linux.tar.gz"
        );

        let entries = entries(&output.path);
        let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert!(names.contains(&"hs/pkgs/core/glibc/2.38/20231201000000/lib/libc.so.6"));
        assert!(names.contains(&"hs/pkgs/core/redis/7.2.4/20240101120000/bin/redis-server"));
        assert!(names.contains(&"hs/pkgs/core/redis/7.2.4/20240101120000/MANIFEST"));
        assert!(entries.iter().all(|(_, mtime, _)| *mtime == 0));

        let (_, _, conf) = entries
            .iter()
            .find(|(n, _, _)| n.ends_with("etc/redis.conf"))
            .unwrap();
        assert_eq!(conf, "port 6379\n");
    }

    #[test]
    fn test_tarball_is_reproducible() {
        let fx = Fixture::new();
        let ctx = fx.redis_context(PackageTarget::X86_64Linux);

        let first = std::fs::read(TarExporter.export(&ctx).unwrap().path).unwrap();
        let second = std::fs::read(TarExporter.export(&ctx).unwrap().path).unwrap();
        assert_eq!(first, second);
    }
}
