//! Signed package artifacts (`.hpkg`)
//!
//! An artifact is a short text header followed by a gzipped tar payload:
//!
//! ```text
//! HPKG-1
//! <signer origin>
//! <base64 minisign signature box over the payload>
//!
//! <tar.gz payload>
//! ```
//!
//! The payload holds `MANIFEST` first and every package file under `pkg/`.
//! Symlinks are kept as tar symlink entries and must resolve inside the
//! package prefix.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use minisign::{PublicKey, SecretKey, SignatureBox};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};
use crate::ident::PackageIdent;
use crate::manifest::{FileEntry, Manifest, VerificationResult};
use crate::target::PackageTarget;

/// First line of every artifact
pub const ARTIFACT_FORMAT: &str = "HPKG-1";

const MANIFEST_ENTRY: &str = "MANIFEST";
const PKG_PREFIX: &str = "pkg/";

/// Assembles a package prefix into a signed artifact
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    ident: PackageIdent,
    target: PackageTarget,
    deps: Vec<PackageIdent>,
    build_deps: Vec<PackageIdent>,
    run: Option<String>,
    exposes: Vec<u16>,
}

impl ArtifactBuilder {
    pub fn new(ident: PackageIdent, target: PackageTarget) -> Self {
        Self {
            ident,
            target,
            deps: Vec::new(),
            build_deps: Vec::new(),
            run: None,
            exposes: Vec::new(),
        }
    }

    pub fn deps(mut self, deps: Vec<PackageIdent>) -> Self {
        self.deps = deps;
        self
    }

    pub fn build_deps(mut self, deps: Vec<PackageIdent>) -> Self {
        self.build_deps = deps;
        self
    }

    pub fn run(mut self, run: Option<String>) -> Self {
        self.run = run;
        self
    }

    pub fn exposes(mut self, ports: Vec<u16>) -> Self {
        self.exposes = ports;
        self
    }

    /// Package `source_dir`, sign it and write the artifact into `out_dir`
    ///
    /// Returns the path of the written artifact.
    pub fn build(
        &self,
        source_dir: &Path,
        signing_key: &SecretKey,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let archive_name = self.ident.archive_name(self.target)?;
        let files = collect_files(source_dir)?;

        let entries = files
            .iter()
            .map(|f| match &f.link {
                Some(target) => FileEntry::symlink(f.archive_path.clone(), target.clone()),
                None => FileEntry::file(f.archive_path.clone(), &f.content),
            })
            .collect();
        let manifest = Manifest::new(
            self.ident.clone(),
            self.target,
            self.run.clone(),
            self.exposes.clone(),
            self.deps.clone(),
            self.build_deps.clone(),
            entries,
        )?;

        let payload = write_payload(&manifest, &files)?;
        let signature = sign_payload(&payload, signing_key, &self.ident)?;

        std::fs::create_dir_all(out_dir)?;
        let out_path = out_dir.join(archive_name);
        let mut out = std::fs::File::create(&out_path)?;
        write!(
            out,
            "{}\n{}\n{}\n\n",
            ARTIFACT_FORMAT,
            self.ident.origin,
            STANDARD.encode(signature.to_string())
        )?;
        out.write_all(&payload)?;
        out.flush()?;

        tracing::debug!(
            ident = %self.ident,
            files = files.len(),
            path = %out_path.display(),
            "wrote artifact"
        );
        Ok(out_path)
    }
}

struct SourceFile {
    archive_path: String,
    mode: u32,
    content: Vec<u8>,
    link: Option<String>,
}

fn collect_files(source_dir: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())?;
            let target = contained_link_target(&rel, &target)?;
            files.push(SourceFile {
                archive_path: format!("{}{}", PKG_PREFIX, rel),
                mode: 0o777,
                content: Vec::new(),
                link: Some(target),
            });
            continue;
        }

        files.push(SourceFile {
            archive_path: format!("{}{}", PKG_PREFIX, rel),
            mode: file_mode(&entry.metadata()?),
            content: std::fs::read(entry.path())?,
            link: None,
        });
    }

    Ok(files)
}

/// Validate that a symlink at `rel` stays inside the package prefix
///
/// Returns the target with `/` separators.
fn contained_link_target(rel: &str, target: &Path) -> Result<String> {
    let unsafe_link = || CoreError::UnsafeSymlink {
        path: rel.to_string(),
        target: target.display().to_string(),
    };

    let mut depth = Path::new(rel)
        .parent()
        .map(|p| p.components().count())
        .unwrap_or(0);
    let mut parts = Vec::new();
    for component in target.components() {
        match component {
            Component::Normal(part) => {
                depth += 1;
                parts.push(part.to_string_lossy().into_owned());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1).ok_or_else(unsafe_link)?;
                parts.push("..".to_string());
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_link()),
        }
    }
    if parts.is_empty() {
        return Err(unsafe_link());
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

fn write_payload(manifest: &Manifest, files: &[SourceFile]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    append_bytes(
        &mut builder,
        MANIFEST_ENTRY,
        manifest.to_string().as_bytes(),
        0o644,
    )?;
    for file in files {
        match &file.link {
            Some(target) => append_symlink(&mut builder, &file.archive_path, target)?,
            None => append_bytes(&mut builder, &file.archive_path, &file.content, file.mode)?,
        }
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Append bytes with a reproducible header (epoch mtime)
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

/// Append a symlink entry with a reproducible header
fn append_symlink<W: Write>(
    builder: &mut Builder<W>,
    path: &str,
    target: &str,
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Symlink);
    header.set_size(0);
    header.set_mode(0o777);
    header.set_mtime(0);
    builder.append_link(&mut header, path, target)?;
    Ok(())
}

fn sign_payload(payload: &[u8], key: &SecretKey, ident: &PackageIdent) -> Result<SignatureBox> {
    let trusted_comment = format!("homestead {}", ident);
    let mut cursor = Cursor::new(payload);
    minisign::sign(None, key, &mut cursor, Some(&trusted_comment), None).map_err(|e| {
        CoreError::InvalidKey {
            kind: "signing".to_string(),
            message: e.to_string(),
        }
    })
}

/// A file extracted from an artifact payload
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    /// Path relative to the package prefix
    pub path: String,
    pub mode: u32,
    /// Empty for symlinks
    pub content: Vec<u8>,
    /// Symlink target, relative to the link's directory
    pub link: Option<String>,
}

/// An opened artifact with its parsed header and manifest
#[derive(Debug, Clone)]
pub struct Artifact {
    path: PathBuf,
    signer: String,
    signature: String,
    payload_offset: usize,
    manifest: Manifest,
}

impl Artifact {
    /// Open an artifact, parsing its header and MANIFEST
    ///
    /// The signature is not checked here; call [`Artifact::verify`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let header = parse_header(&bytes)?;

        let payload = &bytes[header.payload_offset..];
        let manifest = read_manifest(payload)?;

        if manifest.ident.origin != header.signer {
            return Err(CoreError::InvalidArtifact {
                message: format!(
                    "signed by '{}' but packages '{}'",
                    header.signer, manifest.ident
                ),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            signer: header.signer,
            signature: header.signature,
            payload_offset: header.payload_offset,
            manifest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Origin whose key signed the artifact
    pub fn signer(&self) -> &str {
        &self.signer
    }

    pub fn ident(&self) -> &PackageIdent {
        &self.manifest.ident
    }

    pub fn target(&self) -> PackageTarget {
        self.manifest.target
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Paths of the packaged files, relative to the package prefix
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.manifest
            .files
            .iter()
            .filter_map(|f| f.path.strip_prefix(PKG_PREFIX))
    }

    /// Trusted comment embedded in the signature
    pub fn signed_comment(&self) -> Result<String> {
        self.signature_box()?
            .trusted_comment()
            .map_err(|e| self.bad_signature(e.to_string()))
    }

    /// Check the signature against `public_key`, then every file checksum
    pub fn verify(&self, public_key: &PublicKey) -> Result<VerificationResult> {
        let payload = self.payload()?;
        let sig_box = self.signature_box()?;

        let mut cursor = Cursor::new(&payload);
        minisign::verify(public_key, &sig_box, &mut cursor, true, false, false)
            .map_err(|e| self.bad_signature(e.to_string()))?;

        let contents: HashMap<String, PayloadEntry> = read_payload_files(&payload)?
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();
        let expects_link: HashMap<&str, bool> = self
            .manifest
            .files
            .iter()
            .map(|f| (f.path.as_str(), f.link.is_some()))
            .collect();

        self.manifest.verify_files(|path| {
            let entry = contents
                .get(path)
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"))?;
            match (&entry.link, expects_link.get(path).copied().unwrap_or(false)) {
                (Some(target), true) => Ok(target.as_bytes().to_vec()),
                (None, false) => Ok(entry.content.clone()),
                _ => Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "entry kind differs from MANIFEST",
                )),
            }
        })
    }

    /// Every packaged file with its mode and content
    pub fn entries(&self) -> Result<Vec<ArtifactFile>> {
        let payload = self.payload()?;
        Ok(read_payload_files(&payload)?
            .into_iter()
            .filter_map(|entry| {
                entry.path.strip_prefix(PKG_PREFIX).map(|rel| ArtifactFile {
                    path: rel.to_string(),
                    mode: entry.mode,
                    content: entry.content,
                    link: entry.link,
                })
            })
            .collect())
    }

    /// Extract the package files into `dest`
    pub fn unpack(&self, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)?;
        let payload = self.payload()?;
        let mut archive = Archive::new(GzDecoder::new(payload.as_slice()));

        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let path = entry.path()?.to_string_lossy().into_owned();
            let Some(rel) = path.strip_prefix(PKG_PREFIX) else {
                continue;
            };
            let rel_path = safe_relative(rel)?;
            if entry.header().entry_type().is_symlink() {
                let link = entry.link_name()?.ok_or_else(|| {
                    invalid_artifact("symlink entry without a target")
                })?;
                contained_link_target(rel, &link)?;
            }
            let target = dest.join(rel_path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            entry.unpack(&target)?;
        }

        tracing::debug!(ident = %self.ident(), dest = %dest.display(), "unpacked artifact");
        Ok(())
    }

    /// SHA256 of the whole artifact file, hex encoded
    pub fn checksum(&self) -> Result<String> {
        let mut file = std::fs::File::open(&self.path)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let mut bytes = std::fs::read(&self.path)?;
        if bytes.len() < self.payload_offset {
            return Err(CoreError::InvalidArtifact {
                message: "artifact changed on disk".to_string(),
            });
        }
        Ok(bytes.split_off(self.payload_offset))
    }

    fn signature_box(&self) -> Result<SignatureBox> {
        SignatureBox::from_string(&self.signature).map_err(|e| self.bad_signature(e.to_string()))
    }

    fn bad_signature(&self, message: String) -> CoreError {
        CoreError::BadSignature {
            signer: self.signer.clone(),
            message,
        }
    }
}

struct ParsedHeader {
    signer: String,
    signature: String,
    payload_offset: usize,
}

fn parse_header(bytes: &[u8]) -> Result<ParsedHeader> {
    let mut offset = 0;

    if take_line(bytes, &mut offset)? != ARTIFACT_FORMAT {
        return Err(invalid_artifact("missing HPKG-1 header"));
    }
    let signer = take_line(bytes, &mut offset)?.trim().to_string();
    crate::ident::validate_origin(&signer)
        .map_err(|_| invalid_artifact("invalid signer origin"))?;

    let encoded = take_line(bytes, &mut offset)?.trim();
    let signature = STANDARD
        .decode(encoded)
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or_else(|| invalid_artifact("signature is not valid base64"))?;

    if !take_line(bytes, &mut offset)?.is_empty() {
        return Err(invalid_artifact("expected blank line after header"));
    }

    Ok(ParsedHeader {
        signer,
        signature,
        payload_offset: offset,
    })
}

fn take_line<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a str> {
    let rest = &bytes[*offset..];
    let end = rest
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| invalid_artifact("truncated header"))?;
    *offset += end + 1;
    std::str::from_utf8(&rest[..end]).map_err(|_| invalid_artifact("header is not UTF-8"))
}

fn invalid_artifact(message: &str) -> CoreError {
    CoreError::InvalidArtifact {
        message: message.to_string(),
    }
}

fn read_manifest(payload: &[u8]) -> Result<Manifest> {
    let mut archive = Archive::new(GzDecoder::new(payload));
    let mut entries = archive.entries()?;

    let mut first = entries
        .next()
        .ok_or_else(|| CoreError::InvalidArtifact {
            message: "empty payload".to_string(),
        })??;
    if first.path()?.to_string_lossy() != MANIFEST_ENTRY {
        return Err(CoreError::InvalidArtifact {
            message: "MANIFEST must be the first payload entry".to_string(),
        });
    }

    let mut text = String::new();
    first
        .read_to_string(&mut text)
        .map_err(|e| CoreError::InvalidManifest {
            message: format!("Invalid UTF-8 in MANIFEST: {}", e),
        })?;
    Manifest::parse(&text)
}

struct PayloadEntry {
    path: String,
    mode: u32,
    content: Vec<u8>,
    link: Option<String>,
}

/// Read every file and symlink of the payload in a single pass
fn read_payload_files(payload: &[u8]) -> Result<Vec<PayloadEntry>> {
    let mut archive = Archive::new(GzDecoder::new(payload));
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().into_owned();
        let mode = entry.header().mode()?;
        let link = if entry_type.is_symlink() {
            entry
                .link_name()?
                .map(|target| target.to_string_lossy().into_owned())
        } else {
            None
        };
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        files.push(PayloadEntry {
            path,
            mode,
            content,
            link,
        });
    }

    Ok(files)
}

fn safe_relative(rel: &str) -> Result<PathBuf> {
    let path = Path::new(rel);
    if path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Ok(path.to_path_buf())
    } else {
        Err(CoreError::InvalidArtifact {
            message: format!("unsafe path in payload: {}", rel),
        })
    }
}
