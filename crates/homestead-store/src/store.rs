//! Local artifact store
//!
//! Layout under the store root:
//!
//! ```text
//! catalog.db                                   SQLite catalog
//! pkgs/<origin>/<name>/<version>/<release>/    artifact files
//! ```

use homestead_core::{
    Artifact, ChannelIdent, KeyCache, PackageIdent, PackageTarget, latest_satisfying,
    validate_origin,
};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, NewPackage, PackageRecord};
use crate::error::{Result, StoreError};
use crate::suggestions::closest_match;

const CATALOG_FILE: &str = "catalog.db";
const PKGS_DIR: &str = "pkgs";

/// Artifact store rooted at a directory
pub struct ArtifactStore {
    root: PathBuf,
    catalog: Catalog,
}

impl ArtifactStore {
    /// Open or create a store at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(PKGS_DIR))?;
        let catalog = Catalog::open_at(&root.join(CATALOG_FILE))?;
        tracing::debug!(root = %root.display(), "opened artifact store");
        Ok(Self { root, catalog })
    }

    /// Store with an in-memory catalog and artifacts under `root` (for testing)
    pub fn open_memory_at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(PKGS_DIR))?;
        Ok(Self {
            root,
            catalog: Catalog::open_memory()?,
        })
    }

    /// `~/.homestead/store`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".homestead"))
            .unwrap_or_else(|| PathBuf::from(".homestead"))
            .join("store")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every stored artifact
    pub fn pkgs_dir(&self) -> PathBuf {
        self.root.join(PKGS_DIR)
    }

    // ============ Origins ============

    /// Register an origin and return its auth token
    ///
    /// Only a hash of the token is kept; the token itself is shown once.
    pub fn create_origin(&self, origin: &str) -> Result<String> {
        validate_origin(origin)?;
        if self.has_origin(origin)? {
            return Err(StoreError::OriginExists {
                origin: origin.to_string(),
            });
        }

        let token = format!("hs_{}", hex::encode(rand::random::<[u8; 24]>()));
        self.catalog.insert_origin(origin, &hash_token(&token))?;
        self.catalog.ensure_channel(origin, ChannelIdent::UNSTABLE)?;
        self.catalog.ensure_channel(origin, ChannelIdent::STABLE)?;

        tracing::debug!(origin, "created origin");
        Ok(token)
    }

    pub fn has_origin(&self, origin: &str) -> Result<bool> {
        Ok(self.catalog.origin_token(origin)?.is_some())
    }

    pub fn origins(&self) -> Result<Vec<String>> {
        self.catalog.origins()
    }

    /// Check `token` against the origin's stored token hash
    pub fn authorize(&self, origin: &str, token: &str) -> Result<()> {
        let expected = self
            .catalog
            .origin_token(origin)?
            .ok_or_else(|| StoreError::OriginNotFound {
                origin: origin.to_string(),
            })?;
        if expected == hash_token(token) {
            Ok(())
        } else {
            Err(StoreError::Unauthorized {
                origin: origin.to_string(),
            })
        }
    }

    // ============ Packages ============

    /// Verify and import a signed artifact
    ///
    /// The signature is checked with the signer's public key from `keys`
    /// and every file checksum is verified. New packages land in `unstable`.
    pub fn upload(&mut self, path: &Path, keys: &KeyCache) -> Result<PackageIdent> {
        let artifact = Artifact::open(path)?;
        let ident = artifact.ident().clone();
        let target = artifact.target();

        if !self.has_origin(&ident.origin)? {
            return Err(StoreError::OriginNotFound {
                origin: ident.origin.clone(),
            });
        }

        let public_key = keys.public_signing_key(artifact.signer())?;
        let verification = artifact.verify(&public_key)?;
        if !verification.valid {
            let mut files: Vec<String> = verification
                .mismatched
                .iter()
                .map(|m| m.path.clone())
                .collect();
            files.extend(verification.missing.iter().cloned());
            if files.is_empty() {
                files.push("MANIFEST digest".to_string());
            }
            return Err(StoreError::IntegrityCheckFailed {
                ident: ident.to_string(),
                files: files.join(", "),
            });
        }

        if self.catalog.find_package(&ident, target)?.is_some() {
            return Err(StoreError::PackageExists {
                ident: ident.to_string(),
                target: target.to_string(),
            });
        }

        for dep in &artifact.manifest().deps {
            if self.catalog.find_package(dep, target)?.is_none() {
                return Err(StoreError::MissingDependency {
                    ident: ident.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }

        let archive_rel = relative_archive_path(&ident, target)?;
        let dest = self.root.join(&archive_rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(path, &dest)?;

        let checksum = artifact.checksum()?;
        let indexed = self.catalog.insert_package(
            &NewPackage {
                ident: &ident,
                target,
                checksum: &checksum,
                archive: &archive_rel,
                deps: &artifact.manifest().deps,
                build_deps: &artifact.manifest().build_deps,
            },
            ChannelIdent::UNSTABLE,
        );
        if let Err(e) = indexed {
            std::fs::remove_file(&dest).ok();
            return Err(e);
        }

        tracing::debug!(%ident, %target, "uploaded package");
        Ok(ident)
    }

    /// Resolve a partial identifier to the latest fully qualified one
    pub fn resolve(
        &self,
        partial: &PackageIdent,
        channel: Option<&ChannelIdent>,
        target: PackageTarget,
    ) -> Result<PackageIdent> {
        let candidates = self.catalog.candidates(
            &partial.origin,
            &partial.name,
            target,
            channel.map(ChannelIdent::as_str),
        )?;

        match latest_satisfying(partial, &candidates) {
            Some(ident) => {
                tracing::debug!(%partial, resolved = %ident, "resolved identifier");
                Ok(ident.clone())
            }
            None => Err(self.not_found(partial)?),
        }
    }

    fn not_found(&self, ident: &PackageIdent) -> Result<StoreError> {
        let names = self.catalog.package_names()?;
        let short = ident.short().to_string();
        let suggestion = if names.contains(&short) {
            None
        } else {
            closest_match(&short, names.iter().map(String::as_str))
        };
        Ok(StoreError::PackageNotFound {
            ident: ident.to_string(),
            suggestion,
        })
    }

    fn record(&self, ident: &PackageIdent, target: PackageTarget) -> Result<PackageRecord> {
        ident.require_fully_qualified()?;
        match self.catalog.find_package(ident, target)? {
            Some(record) => Ok(record),
            None => Err(self.not_found(ident)?),
        }
    }

    /// On-disk path of a stored artifact
    pub fn artifact_path(&self, ident: &PackageIdent, target: PackageTarget) -> Result<PathBuf> {
        let record = self.record(ident, target)?;
        Ok(self.root.join(record.archive))
    }

    pub fn open_artifact(&self, ident: &PackageIdent, target: PackageTarget) -> Result<Artifact> {
        Ok(Artifact::open(self.artifact_path(ident, target)?)?)
    }

    /// Transitive runtime dependencies, breadth first, without duplicates
    ///
    /// The package itself is not included.
    pub fn runtime_closure(
        &self,
        ident: &PackageIdent,
        target: PackageTarget,
    ) -> Result<Vec<PackageIdent>> {
        let root = self.record(ident, target)?;
        let mut seen: HashSet<PackageIdent> = HashSet::from([root.ident.clone()]);
        let mut queue: VecDeque<PackageIdent> = root.deps.into_iter().collect();
        let mut closure = Vec::new();

        while let Some(dep) = queue.pop_front() {
            if !seen.insert(dep.clone()) {
                continue;
            }
            let record = self.record(&dep, target)?;
            queue.extend(record.deps);
            closure.push(dep);
        }

        Ok(closure)
    }

    // ============ Channels ============

    /// Add a package to a channel, creating the channel if needed
    ///
    /// Returns `false` when the package was already in the channel.
    pub fn promote(
        &self,
        ident: &PackageIdent,
        channel: &ChannelIdent,
        target: PackageTarget,
    ) -> Result<bool> {
        let record = self.record(ident, target)?;
        let channel_id = self.catalog.ensure_channel(&ident.origin, channel.as_str())?;
        let added = self.catalog.add_to_channel(channel_id, record.id)?;
        tracing::debug!(%ident, %channel, added, "promoted package");
        Ok(added)
    }

    /// Remove a package from a channel
    ///
    /// `unstable` holds every upload and cannot be demoted from. Returns
    /// `false` when the package was not in the channel.
    pub fn demote(
        &self,
        ident: &PackageIdent,
        channel: &ChannelIdent,
        target: PackageTarget,
    ) -> Result<bool> {
        if channel.as_str() == ChannelIdent::UNSTABLE {
            return Err(StoreError::CannotDemote {
                channel: channel.to_string(),
            });
        }
        let record = self.record(ident, target)?;
        let channel_id = self
            .catalog
            .channel_id(&ident.origin, channel.as_str())?
            .ok_or_else(|| StoreError::ChannelNotFound {
                origin: ident.origin.clone(),
                channel: channel.to_string(),
            })?;
        let removed = self.catalog.remove_from_channel(channel_id, record.id)?;
        tracing::debug!(%ident, %channel, removed, "demoted package");
        Ok(removed)
    }

    pub fn channels_for(
        &self,
        ident: &PackageIdent,
        target: PackageTarget,
    ) -> Result<Vec<ChannelIdent>> {
        let record = self.record(ident, target)?;
        self.catalog
            .channels_for(record.id)?
            .into_iter()
            .map(|c| c.parse::<ChannelIdent>().map_err(StoreError::from))
            .collect()
    }

    // ============ Listing ============

    pub fn list(&self, origin: &str, name: Option<&str>) -> Result<Vec<PackageRecord>> {
        self.catalog.list(origin, name)
    }

    pub fn search(&self, query: &str) -> Result<Vec<PackageRecord>> {
        self.catalog.search(query)
    }
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn relative_archive_path(ident: &PackageIdent, target: PackageTarget) -> Result<String> {
    let dir: Vec<&str> = ident.iter().collect();
    Ok(format!(
        "{}/{}/{}",
        PKGS_DIR,
        dir.join("/"),
        ident.archive_name(target)?
    ))
}
