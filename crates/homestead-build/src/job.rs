//! Build jobs
//!
//! A [`BuildJob`] turns a plan directory into a signed artifact:
//!
//! 1. load and validate `plan.yaml`
//! 2. resolve `deps` and `build_deps` against the store
//! 3. check that every secret the plan names is available
//! 4. unpack resolved dependencies into a staging area and run the build
//!    script with `sh -c` in the plan directory
//! 5. package `$HS_PKG_PREFIX` as a signed artifact
//!
//! Secret values are injected into the build environment only. They are never
//! logged, and a package containing one is rejected.

use homestead_core::{
    ArtifactBuilder, ChannelIdent, KeyCache, LoadedPlan, PackageIdent, PackageTarget, Plan,
    Release,
};
use homestead_store::ArtifactStore;
use homestead_vault::BuildSecrets;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{BuildError, Result};

/// Default output directory, relative to the plan directory
pub const RESULTS_DIR: &str = "results";

/// Secret values shorter than this are not searched for in package files
const MIN_SCANNED_SECRET_LEN: usize = 6;

/// What a successful build produced
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub ident: PackageIdent,
    pub target: PackageTarget,
    /// Path of the signed artifact
    pub artifact: PathBuf,
    pub deps: Vec<PackageIdent>,
    pub build_deps: Vec<PackageIdent>,
}

/// A single build of a plan directory
pub struct BuildJob<'a> {
    plan_dir: PathBuf,
    store: &'a ArtifactStore,
    keys: &'a KeyCache,
    channel: Option<ChannelIdent>,
    secrets: BuildSecrets,
    target: PackageTarget,
    output: Option<PathBuf>,
    password: Option<String>,
}

impl<'a> BuildJob<'a> {
    pub fn new(plan_dir: impl Into<PathBuf>, store: &'a ArtifactStore, keys: &'a KeyCache) -> Self {
        Self {
            plan_dir: plan_dir.into(),
            store,
            keys,
            channel: None,
            secrets: BuildSecrets::new(),
            target: PackageTarget::active(),
            output: None,
            password: None,
        }
    }

    /// Resolve dependencies from this channel only
    pub fn channel(mut self, channel: Option<ChannelIdent>) -> Self {
        self.channel = channel;
        self
    }

    pub fn secrets(mut self, secrets: BuildSecrets) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn target(mut self, target: PackageTarget) -> Self {
        self.target = target;
        self
    }

    /// Directory for the artifact; defaults to `<plan_dir>/results`
    pub fn output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output = Some(dir.into());
        self
    }

    /// Password for an encrypted origin signing key
    pub fn password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub async fn run(self) -> Result<BuildOutcome> {
        let LoadedPlan { plan, root } = Plan::load(&self.plan_dir)?;
        let ident = plan.ident(&Release::now())?;
        tracing::info!(%ident, target = %self.target, "starting build");

        let deps = self.resolve_all(&plan.dep_idents()?)?;
        let build_deps = self.resolve_all(&plan.build_dep_idents()?)?;

        if let Some(name) = plan.secrets.iter().find(|s| !self.secrets.contains(s)) {
            return Err(BuildError::MissingSecret { name: name.clone() });
        }

        // Fail on a locked or missing key before running anything
        let signing_key = self
            .keys
            .secret_signing_key(&plan.origin, self.password.clone())?;

        let staging = TempDir::new()?;
        let prefix = staging.path().join("prefix");
        let pkgs = staging.path().join("pkgs");
        std::fs::create_dir_all(&prefix)?;
        let dep_bins = self.install_deps(&pkgs, deps.iter().chain(&build_deps))?;

        let env = BuildEnv {
            ident: &ident,
            prefix: &prefix,
            pkgs: &pkgs,
            deps: &deps,
            build_deps: &build_deps,
            dep_bins: &dep_bins,
        };
        self.run_script(&plan, &root, &env).await?;
        self.check_for_leaks(&prefix)?;

        let out_dir = self
            .output
            .clone()
            .unwrap_or_else(|| root.join(RESULTS_DIR));
        let artifact = ArtifactBuilder::new(ident.clone(), self.target)
            .deps(deps.clone())
            .build_deps(build_deps.clone())
            .run(plan.run.clone())
            .exposes(plan.exposes.clone())
            .build(&prefix, &signing_key, &out_dir)?;

        tracing::info!(%ident, artifact = %artifact.display(), "build complete");
        Ok(BuildOutcome {
            ident,
            target: self.target,
            artifact,
            deps,
            build_deps,
        })
    }

    fn resolve_all(&self, partials: &[PackageIdent]) -> Result<Vec<PackageIdent>> {
        partials
            .iter()
            .map(|p| {
                self.store
                    .resolve(p, self.channel.as_ref(), self.target)
                    .map_err(BuildError::from)
            })
            .collect()
    }

    /// Unpack dependencies and their runtime closures under `pkgs`
    ///
    /// Returns the `bin/` directories found, in dependency order.
    fn install_deps<'i>(
        &self,
        pkgs: &Path,
        direct: impl Iterator<Item = &'i PackageIdent>,
    ) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut bins = Vec::new();

        for dep in direct {
            let closure = self.store.runtime_closure(dep, self.target)?;
            for ident in std::iter::once(dep).chain(closure.iter()) {
                if !seen.insert(ident.clone()) {
                    continue;
                }
                let dest = ident.iter().fold(pkgs.to_path_buf(), |p, part| p.join(part));
                self.store
                    .open_artifact(ident, self.target)?
                    .unpack(&dest)?;
                tracing::debug!(%ident, dest = %dest.display(), "installed dependency");

                let bin = dest.join("bin");
                if bin.is_dir() {
                    bins.push(bin);
                }
            }
        }

        Ok(bins)
    }

    async fn run_script(&self, plan: &Plan, root: &Path, env: &BuildEnv<'_>) -> Result<()> {
        let mut command = tokio::process::Command::new("sh");
        command
            .arg("-c")
            .arg(&plan.build)
            .current_dir(root)
            .stdin(Stdio::null());

        for (key, value) in env.vars() {
            command.env(key, value);
        }
        for (key, value) in &plan.env {
            command.env(key, value);
        }
        for (key, value) in self.secrets.env() {
            command.env(key, value);
        }

        tracing::debug!(
            env = ?plan.env.keys().collect::<Vec<_>>(),
            secrets = ?self.secrets.names().collect::<Vec<_>>(),
            "running build script"
        );
        let status = command.status().await?;
        if !status.success() {
            return Err(BuildError::BuildFailed {
                code: status.code(),
            });
        }
        Ok(())
    }

    fn check_for_leaks(&self, prefix: &Path) -> Result<()> {
        let scanned: Vec<(&str, &str)> = self
            .secrets
            .env()
            .filter(|(_, value)| value.len() >= MIN_SCANNED_SECRET_LEN)
            .collect();
        if scanned.is_empty() {
            return Ok(());
        }

        for entry in WalkDir::new(prefix) {
            let entry = entry?;
            let content = if entry.file_type().is_symlink() {
                std::fs::read_link(entry.path())?
                    .to_string_lossy()
                    .into_owned()
                    .into_bytes()
            } else if entry.file_type().is_file() {
                std::fs::read(entry.path())?
            } else {
                continue;
            };
            for (name, value) in &scanned {
                let needle = value.as_bytes();
                if content.windows(needle.len()).any(|w| w == needle) {
                    let rel = entry.path().strip_prefix(prefix).unwrap_or(entry.path());
                    return Err(BuildError::SecretLeaked {
                        name: name.to_string(),
                        path: rel.display().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The `HS_*` variables and `PATH` of a build
struct BuildEnv<'a> {
    ident: &'a PackageIdent,
    prefix: &'a Path,
    pkgs: &'a Path,
    deps: &'a [PackageIdent],
    build_deps: &'a [PackageIdent],
    dep_bins: &'a [PathBuf],
}

impl BuildEnv<'_> {
    fn vars(&self) -> Vec<(&'static str, OsString)> {
        let joined = |idents: &[PackageIdent]| {
            idents
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        };

        let mut paths: Vec<PathBuf> = self.dep_bins.to_vec();
        if let Some(path) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&path));
        }
        let path = std::env::join_paths(paths).unwrap_or_default();

        vec![
            ("HS_PKG_ORIGIN", self.ident.origin.clone().into()),
            ("HS_PKG_NAME", self.ident.name.clone().into()),
            (
                "HS_PKG_VERSION",
                self.ident.version.clone().unwrap_or_default().into(),
            ),
            (
                "HS_PKG_RELEASE",
                self.ident.release.clone().unwrap_or_default().into(),
            ),
            ("HS_PKG_IDENT", self.ident.to_string().into()),
            ("HS_PKG_PREFIX", self.prefix.as_os_str().to_os_string()),
            ("HS_PKG_DEPS", joined(self.deps).into()),
            ("HS_PKG_BUILD_DEPS", joined(self.build_deps).into()),
            ("HS_STORE_PKGS", self.pkgs.as_os_str().to_os_string()),
            ("PATH", path),
        ]
    }
}
