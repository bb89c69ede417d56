//! Package manifest for artifact integrity verification
//!
//! The MANIFEST is a text file stored first in every artifact payload. It
//! carries the package identity, runtime metadata, dependency lists and a
//! SHA256 checksum for every packaged file.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::ident::PackageIdent;
use crate::target::PackageTarget;

/// Current manifest format version
pub const MANIFEST_VERSION: u32 = 1;

/// A file entry in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path within the artifact payload
    pub path: String,
    /// SHA256 of the file contents, or of the link target for symlinks
    pub sha256: String,
    /// Target of a symbolic link, relative to the link's directory
    pub link: Option<String>,
}

impl FileEntry {
    pub fn file(path: impl Into<String>, content: &[u8]) -> Self {
        Self {
            path: path.into(),
            sha256: hash_bytes(content),
            link: None,
        }
    }

    pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            path: path.into(),
            sha256: hash_bytes(target.as_bytes()),
            link: Some(target),
        }
    }
}

/// Package manifest containing identity, dependencies and checksums
#[derive(Debug, Clone)]
pub struct Manifest {
    pub version: u32,
    /// Fully qualified package identifier
    pub ident: PackageIdent,
    pub target: PackageTarget,
    pub created: DateTime<Utc>,
    /// Command the package runs as a service, relative to its prefix
    pub run: Option<String>,
    /// Ports the service listens on
    pub exposes: Vec<u16>,
    /// Runtime dependencies (fully qualified)
    pub deps: Vec<PackageIdent>,
    /// Build dependencies (fully qualified)
    pub build_deps: Vec<PackageIdent>,
    /// Files and their checksums, sorted by path
    pub files: Vec<FileEntry>,
    /// Digest over every file checksum
    pub digest: String,
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "homestead-manifest-version: {}", self.version)?;
        writeln!(f, "ident: {}", self.ident)?;
        writeln!(f, "target: {}", self.target)?;
        writeln!(f, "created: {}", self.created.to_rfc3339())?;
        if let Some(run) = &self.run {
            writeln!(f, "run: {}", run)?;
        }
        if !self.exposes.is_empty() {
            let ports: Vec<String> = self.exposes.iter().map(u16::to_string).collect();
            writeln!(f, "exposes: {}", ports.join(","))?;
        }
        writeln!(f)?;

        writeln!(f, "[deps]")?;
        for dep in &self.deps {
            writeln!(f, "{}", dep)?;
        }
        writeln!(f)?;

        writeln!(f, "[build-deps]")?;
        for dep in &self.build_deps {
            writeln!(f, "{}", dep)?;
        }
        writeln!(f)?;

        writeln!(f, "[files]")?;
        for entry in &self.files {
            match &entry.link {
                Some(target) => {
                    writeln!(f, "{} link:{} sha256:{}", entry.path, target, entry.sha256)?
                }
                None => writeln!(f, "{} sha256:{}", entry.path, entry.sha256)?,
            }
        }
        writeln!(f)?;

        writeln!(f, "[digest]")?;
        write!(f, "sha256:{}", self.digest)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Header,
    Deps,
    BuildDeps,
    Files,
    Digest,
}

impl Manifest {
    /// Build a manifest from already-hashed files
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ident: PackageIdent,
        target: PackageTarget,
        run: Option<String>,
        exposes: Vec<u16>,
        deps: Vec<PackageIdent>,
        build_deps: Vec<PackageIdent>,
        mut files: Vec<FileEntry>,
    ) -> Result<Self> {
        ident.require_fully_qualified()?;
        for dep in deps.iter().chain(build_deps.iter()) {
            dep.require_fully_qualified()?;
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let digest = calculate_digest(&files);

        Ok(Self {
            version: MANIFEST_VERSION,
            ident,
            target,
            created: Utc::now(),
            run,
            exposes,
            deps,
            build_deps,
            files,
            digest,
        })
    }

    /// Parse a manifest from its text representation
    pub fn parse(content: &str) -> Result<Self> {
        let mut version: Option<u32> = None;
        let mut ident: Option<PackageIdent> = None;
        let mut target: Option<PackageTarget> = None;
        let mut created: Option<DateTime<Utc>> = None;
        let mut run = None;
        let mut exposes = Vec::new();
        let mut deps = Vec::new();
        let mut build_deps = Vec::new();
        let mut files = Vec::new();
        let mut digest: Option<String> = None;

        let mut section = Section::Header;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match line {
                "[deps]" => {
                    section = Section::Deps;
                    continue;
                }
                "[build-deps]" => {
                    section = Section::BuildDeps;
                    continue;
                }
                "[files]" => {
                    section = Section::Files;
                    continue;
                }
                "[digest]" => {
                    section = Section::Digest;
                    continue;
                }
                _ => {}
            }

            match section {
                Section::Digest => {
                    if let Some(hash) = line.strip_prefix("sha256:") {
                        digest = Some(hash.to_string());
                    }
                }
                Section::Files => {
                    if let Some((rest, hash_part)) = line.rsplit_once(' ') {
                        if let Some(hash) = hash_part.strip_prefix("sha256:") {
                            let (path, link) = match rest.split_once(" link:") {
                                Some((path, target)) => (path, Some(target.to_string())),
                                None => (rest, None),
                            };
                            files.push(FileEntry {
                                path: path.to_string(),
                                sha256: hash.to_string(),
                                link,
                            });
                        }
                    }
                }
                Section::Deps => deps.push(line.parse()?),
                Section::BuildDeps => build_deps.push(line.parse()?),
                Section::Header => {
                    let Some((key, value)) = line.split_once(':') else {
                        continue;
                    };
                    let value = value.trim();
                    match key.trim() {
                        "homestead-manifest-version" => version = value.parse().ok(),
                        "ident" => ident = Some(value.parse()?),
                        "target" => target = Some(value.parse()?),
                        "created" => {
                            created = DateTime::parse_from_rfc3339(value)
                                .ok()
                                .map(|dt| dt.with_timezone(&Utc));
                        }
                        "run" => run = Some(value.to_string()),
                        "exposes" => {
                            exposes = value
                                .split(',')
                                .map(|p| {
                                    p.trim().parse::<u16>().map_err(|_| {
                                        CoreError::InvalidManifest {
                                            message: format!("invalid port '{}'", p),
                                        }
                                    })
                                })
                                .collect::<Result<Vec<_>>>()?;
                        }
                        _ => {}
                    }
                }
            }
        }

        let missing = |field: &str| CoreError::InvalidManifest {
            message: format!("Missing or invalid {}", field),
        };

        let ident = ident.ok_or_else(|| missing("ident"))?;
        ident
            .require_fully_qualified()
            .map_err(|_| missing("ident"))?;

        Ok(Self {
            version: version.ok_or_else(|| missing("homestead-manifest-version"))?,
            ident,
            target: target.ok_or_else(|| missing("target"))?,
            created: created.ok_or_else(|| missing("created timestamp"))?,
            run,
            exposes,
            deps,
            build_deps,
            files,
            digest: digest.ok_or_else(|| missing("digest"))?,
        })
    }

    /// Verify that all files match their checksums
    ///
    /// Takes a function that reads file content given its payload path
    pub fn verify_files<F>(&self, read_file: F) -> Result<VerificationResult>
    where
        F: Fn(&str) -> std::io::Result<Vec<u8>>,
    {
        let mut result = VerificationResult {
            valid: true,
            mismatched: Vec::new(),
            missing: Vec::new(),
        };

        for entry in &self.files {
            match read_file(&entry.path) {
                Ok(content) => {
                    let actual = hash_bytes(&content);
                    if actual != entry.sha256 {
                        result.valid = false;
                        result.mismatched.push(MismatchedFile {
                            path: entry.path.clone(),
                            expected: entry.sha256.clone(),
                            actual,
                        });
                    }
                }
                Err(_) => {
                    result.valid = false;
                    result.missing.push(entry.path.clone());
                }
            }
        }

        if calculate_digest(&self.files) != self.digest {
            result.valid = false;
        }

        Ok(result)
    }
}

/// Result of verifying files against the manifest
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Every file matched and the digest is consistent
    pub valid: bool,
    pub mismatched: Vec<MismatchedFile>,
    pub missing: Vec<String>,
}

/// A file whose content does not match its recorded checksum
#[derive(Debug, Clone)]
pub struct MismatchedFile {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

/// SHA256 of a byte slice, hex encoded
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn calculate_digest(files: &[FileEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in files {
        hasher.update(entry.path.as_bytes());
        hasher.update(b":");
        hasher.update(entry.sha256.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
