//! Filesystem layout shared by the tar and OCI exporters
//!
//! Every package lands under `hs/pkgs/<origin>/<name>/<version>/<release>/`
//! together with its `MANIFEST`, mirroring an installed store.

use flate2::Compression;
use flate2::write::GzEncoder;
use homestead_core::{Artifact, PackageIdent};
use std::io::Write;
use tar::{Builder, EntryType, Header};

use crate::error::Result;
use crate::exporter::ExportContext;

pub const PKGS_ROOT: &str = "hs/pkgs";

/// Install prefix of a package inside the exported filesystem, without leading `/`
pub fn package_root(ident: &PackageIdent) -> String {
    let mut root = PKGS_ROOT.to_string();
    for part in ident.iter() {
        root.push('/');
        root.push_str(part);
    }
    root
}

/// Uncompressed tar of the closure and the package
pub fn rootfs_tar(ctx: &ExportContext) -> Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    for artifact in ctx.artifacts() {
        append_artifact(&mut builder, artifact)?;
    }
    Ok(builder.into_inner()?)
}

pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn append_artifact<W: Write>(builder: &mut Builder<W>, artifact: &Artifact) -> Result<()> {
    let root = package_root(artifact.ident());

    append_bytes(
        builder,
        &format!("{}/MANIFEST", root),
        artifact.manifest().to_string().as_bytes(),
        0o644,
    )?;
    for file in artifact.entries()? {
        let path = format!("{}/{}", root, file.path);
        match &file.link {
            Some(target) => {
                let mut header = Header::new_gnu();
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                header.set_mode(0o777);
                header.set_mtime(0);
                builder.append_link(&mut header, &path, target)?;
            }
            None => append_bytes(builder, &path, &file.content, file.mode)?,
        }
    }

    tracing::trace!(ident = %artifact.ident(), root, "added package to rootfs");
    Ok(())
}

fn append_bytes<W: Write>(
    builder: &mut Builder<W>,
    path: &str,
    content: &[u8],
    mode: u32,
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_cksum();
    builder.append_data(&mut header, path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Fixture, write_file};

    #[test]
    fn test_package_root() {
        let ident: PackageIdent = "core/redis/7.2.4/20240101120000".parse().unwrap();
        assert_eq!(
            package_root(&ident),
            "hs/pkgs/core/redis/7.2.4/20240101120000"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_rootfs_keeps_symlinks() {
        let fx = Fixture::new();
        let ident = "core/libfoo/1.2.0/20240101120000";
        let source = fx.source_dir(ident);
        write_file(&source, "lib/libfoo.so.1.2", "elf");
        std::os::unix::fs::symlink("libfoo.so.1.2", source.join("lib/libfoo.so.1")).unwrap();
        let artifact = fx.artifact_from_dir(
            ident,
            homestead_core::PackageTarget::X86_64Linux,
            &source,
            None,
            vec![],
        );

        let ctx = ExportContext::new(artifact, vec![], fx.out_dir());
        let data = rootfs_tar(&ctx).unwrap();
        let mut archive = tar::Archive::new(data.as_slice());
        let link = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap())
            .find(|e| e.path().unwrap().ends_with("lib/libfoo.so.1"))
            .unwrap();

        assert!(link.header().entry_type().is_symlink());
        assert_eq!(
            link.link_name().unwrap().unwrap().to_string_lossy(),
            "libfoo.so.1.2"
        );
    }
}
