//! OCI image layout export
//!
//! Produces a single-layer image in an OCI layout directory:
//!
//! ```text
//! <ident>-<target>-oci/
//! ├── oci-layout
//! ├── index.json
//! └── blobs/sha256/
//!     ├── <layer>      rootfs tar.gz
//!     ├── <config>     image config
//!     └── <manifest>   image manifest
//! ```
//!
//! The layout can be loaded with `skopeo copy oci:<dir> ...` or similar tools.

use homestead_core::{Artifact, PackageIdent, PackageTarget};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ExportError, Result};
use crate::exporter::{ExportContext, ExportOutput, Exporter};
use crate::format::ExportFormat;
use crate::rootfs;

pub const MEDIA_TYPE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_TYPE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
pub const MEDIA_TYPE_LAYER: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";
const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";
const BASE_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

const MAX_TAG_LEN: usize = 128;

/// Repository component used when nothing valid is left after sanitizing
pub const FALLBACK_NAME: &str = "package";

/// Image tag for a package: `<version>-<release>`
///
/// Characters a tag cannot hold become `_`.
pub fn image_tag(ident: &PackageIdent) -> String {
    let raw = match (&ident.version, &ident.release) {
        (Some(version), Some(release)) => format!("{}-{}", version, release),
        (Some(version), None) => version.clone(),
        _ => "latest".to_string(),
    };
    let mut tag: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if tag.starts_with(['.', '-']) {
        tag.insert(0, '_');
    }
    tag.truncate(MAX_TAG_LEN);
    tag
}

/// Lowercase repository path component with single separators
fn repository_component(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars().map(|c| c.to_ascii_lowercase()) {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with(['.', '_', '-']) {
            out.push(if matches!(c, '.' | '_') { c } else { '-' });
        }
    }
    let trimmed = out.trim_end_matches(['.', '_', '-']);
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Image reference for a package: `<origin>/<name>:<version>-<release>`
pub fn image_reference(ident: &PackageIdent) -> String {
    format!(
        "{}/{}:{}",
        repository_component(&ident.origin),
        repository_component(&ident.name),
        image_tag(ident)
    )
}

/// OCI `os` and `architecture` for a target; only Linux images are supported
pub fn platform(target: PackageTarget) -> Option<(&'static str, &'static str)> {
    match target {
        PackageTarget::X86_64Linux => Some(("linux", "amd64")),
        PackageTarget::Aarch64Linux => Some(("linux", "arm64")),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    media_type: &'static str,
    digest: String,
    size: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageIndex {
    schema_version: u32,
    media_type: &'static str,
    manifests: Vec<Descriptor>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageManifest {
    schema_version: u32,
    media_type: &'static str,
    config: Descriptor,
    layers: Vec<Descriptor>,
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ImageConfig {
    created: String,
    architecture: &'static str,
    os: &'static str,
    config: ContainerConfig,
    rootfs: RootFs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerConfig {
    env: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cmd: Option<Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    exposed_ports: BTreeMap<String, Empty>,
    working_dir: String,
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Empty {}

#[derive(Debug, Serialize)]
struct RootFs {
    #[serde(rename = "type")]
    kind: &'static str,
    diff_ids: Vec<String>,
}

/// Writes an OCI image layout directory
#[derive(Debug, Default, Clone, Copy)]
pub struct OciExporter;

impl Exporter for OciExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Oci
    }

    fn export(&self, ctx: &ExportContext) -> Result<ExportOutput> {
        let artifact = &ctx.artifact;
        let ident = artifact.ident();
        let (os, architecture) =
            platform(artifact.target()).ok_or(ExportError::UnsupportedTarget {
                format: ExportFormat::Oci,
                target: artifact.target(),
            })?;

        let dir = ctx
            .out_dir()
            .join(format!("{}-{}-oci", ident.dashed(), artifact.target()));
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(dir.join("blobs").join("sha256"))?;

        let layer_tar = rootfs::rootfs_tar(ctx)?;
        let diff_id = sha256_digest(&layer_tar);
        let layer = write_blob(&dir, MEDIA_TYPE_LAYER, &rootfs::gzip(&layer_tar)?)?;

        let config = ImageConfig {
            created: artifact.manifest().created.to_rfc3339(),
            architecture,
            os,
            config: container_config(ctx),
            rootfs: RootFs {
                kind: "layers",
                diff_ids: vec![diff_id],
            },
        };
        let config = write_blob(&dir, MEDIA_TYPE_CONFIG, &serde_json::to_vec(&config)?)?;

        let manifest = ImageManifest {
            schema_version: 2,
            media_type: MEDIA_TYPE_MANIFEST,
            config,
            layers: vec![layer],
            annotations: BTreeMap::from([(TITLE_ANNOTATION.to_string(), ident.to_string())]),
        };
        let mut manifest = write_blob(&dir, MEDIA_TYPE_MANIFEST, &serde_json::to_vec(&manifest)?)?;
        manifest
            .annotations
            .insert(REF_NAME_ANNOTATION.to_string(), image_tag(ident));

        let index = ImageIndex {
            schema_version: 2,
            media_type: MEDIA_TYPE_INDEX,
            manifests: vec![manifest],
        };
        std::fs::write(
            dir.join("index.json"),
            serde_json::to_vec_pretty(&index)?,
        )?;
        std::fs::write(
            dir.join("oci-layout"),
            r#"{"imageLayoutVersion":"1.0.0"}"#,
        )?;

        tracing::debug!(%ident, path = %dir.display(), "exported OCI image layout");
        Ok(ExportOutput {
            format: ExportFormat::Oci,
            path: dir,
        })
    }
}

fn container_config(ctx: &ExportContext) -> ContainerConfig {
    let manifest = ctx.artifact.manifest();
    let root = format!("/{}", rootfs::package_root(&manifest.ident));

    // The package's own bin/ comes first, then its dependencies
    let mut path: Vec<String> = std::iter::once(&ctx.artifact)
        .chain(ctx.closure.iter())
        .filter(|a| has_bin_dir(a))
        .map(|a| format!("/{}/bin", rootfs::package_root(a.ident())))
        .collect();
    path.push(BASE_PATH.to_string());

    let cmd = manifest.run.as_deref().and_then(|run| {
        let mut parts = run.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        let program = if program.starts_with('/') {
            program
        } else {
            format!("{}/{}", root, program)
        };
        Some(std::iter::once(program).chain(parts).collect())
    });

    ContainerConfig {
        env: vec![format!("PATH={}", path.join(":"))],
        cmd,
        exposed_ports: manifest
            .exposes
            .iter()
            .map(|port| (format!("{}/tcp", port), Empty {}))
            .collect(),
        working_dir: root,
        labels: BTreeMap::from([
            ("io.homestead.ident".to_string(), manifest.ident.to_string()),
            ("io.homestead.target".to_string(), manifest.target.to_string()),
        ]),
    }
}

fn has_bin_dir(artifact: &Artifact) -> bool {
    artifact.files().any(|f| f.starts_with("bin/"))
}

fn sha256_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

fn write_blob(dir: &Path, media_type: &'static str, data: &[u8]) -> Result<Descriptor> {
    let digest = sha256_digest(data);
    let hex = digest.trim_start_matches("sha256:");
    std::fs::write(dir.join("blobs").join("sha256").join(hex), data)?;
    Ok(Descriptor {
        media_type,
        digest,
        size: data.len() as u64,
        annotations: BTreeMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use flate2::read::GzDecoder;
    use serde_json::Value;
    use std::io::Read;

    fn read_blob(dir: &Path, digest: &str) -> Vec<u8> {
        let hex = digest.trim_start_matches("sha256:");
        let data = std::fs::read(dir.join("blobs/sha256").join(hex)).unwrap();
        assert_eq!(sha256_digest(&data), digest);
        data
    }

    fn read_json(dir: &Path, digest: &str) -> Value {
        serde_json::from_slice(&read_blob(dir, digest)).unwrap()
    }

    #[test]
    fn test_image_reference() {
        let ident: PackageIdent = "core/redis/7.2.4/20240101120000".parse().unwrap();
        assert_eq!(image_tag(&ident), "7.2.4-20240101120000");
        assert_eq!(image_reference(&ident), "core/redis:7.2.4-20240101120000");
    }

    #[test]
    fn test_image_reference_is_sanitized() {
        let ident: PackageIdent = "core/Gtk+/3.0+git/20240101120000".parse().unwrap();
        assert_eq!(image_tag(&ident), "3.0_git-20240101120000");
        assert_eq!(image_reference(&ident), "core/gtk:3.0_git-20240101120000");

        let ident: PackageIdent = "core/___/1.0/20240101120000".parse().unwrap();
        assert_eq!(image_reference(&ident), "core/package:1.0-20240101120000");

        let ident: PackageIdent = "core/lib__foo/-rc1".parse().unwrap();
        assert_eq!(image_reference(&ident), "core/lib_foo:_-rc1");
    }

    #[test]
    fn test_layout() {
        let fx = Fixture::new();
        let ctx = fx.redis_context(PackageTarget::X86_64Linux);
        let output = OciExporter.export(&ctx).unwrap();
        let dir = output.path;

        let layout: Value =
            serde_json::from_slice(&std::fs::read(dir.join("oci-layout")).unwrap()).unwrap();
        assert_eq!(layout["imageLayoutVersion"], "1.0.0");

        let index: Value =
            serde_json::from_slice(&std::fs::read(dir.join("index.json")).unwrap()).unwrap();
        let entry = &index["manifests"][0];
        assert_eq!(entry["mediaType"], MEDIA_TYPE_MANIFEST);
        assert_eq!(
            entry["annotations"][REF_NAME_ANNOTATION],
            "7.2.4-20240101120000"
        );

        let manifest = read_json(&dir, entry["digest"].as_str().unwrap());
        assert_eq!(manifest["schemaVersion"], 2);
        let config = read_json(&dir, manifest["config"]["digest"].as_str().unwrap());
        assert_eq!(config["os"], "linux");
        assert_eq!(config["architecture"], "amd64");

        let cmd: Vec<&str> = config["config"]["Cmd"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(
            cmd,
            vec![
                "/hs/pkgs/core/redis/7.2.4/20240101120000/bin/redis-server",
                "--protected-mode",
                "no"
            ]
        );
        assert!(config["config"]["ExposedPorts"]["6379/tcp"].is_object());

        let env = config["config"]["Env"][0].as_str().unwrap();
        assert!(env.starts_with("PATH=/hs/pkgs/core/redis/7.2.4/20240101120000/bin:"));
        assert!(!env.contains("glibc"));

        // diff_id is the digest of the uncompressed layer
        let layer = read_blob(&dir, manifest["layers"][0]["digest"].as_str().unwrap());
        let mut tar = Vec::new();
        GzDecoder::new(layer.as_slice()).read_to_end(&mut tar).unwrap();
        assert_eq!(config["rootfs"]["diff_ids"][0], sha256_digest(&tar));
    }

    #[test]
    fn test_no_run_command() {
        let fx = Fixture::new();
        let artifact = fx.artifact(
            "core/zlib/1.3.1/20240101120000",
            PackageTarget::Aarch64Linux,
            &[("lib/libz.so", "z")],
            None,
            vec![],
        );
        let ctx = ExportContext::new(artifact, vec![], fx.out_dir());
        let dir = OciExporter.export(&ctx).unwrap().path;

        let index: Value =
            serde_json::from_slice(&std::fs::read(dir.join("index.json")).unwrap()).unwrap();
        let manifest = read_json(&dir, index["manifests"][0]["digest"].as_str().unwrap());
        let config = read_json(&dir, manifest["config"]["digest"].as_str().unwrap());
        assert_eq!(config["architecture"], "arm64");
        assert!(config["config"].get("Cmd").is_none());
        assert!(config["config"].get("ExposedPorts").is_none());
    }

    #[test]
    fn test_rejects_non_linux_target() {
        let fx = Fixture::new();
        let ctx = fx.redis_context(PackageTarget::X86_64Windows);
        assert!(matches!(
            OciExporter.export(&ctx),
            Err(ExportError::UnsupportedTarget { .. })
        ));
    }
}
