//! Artifact fixtures for exporter tests

use homestead_core::{Artifact, ArtifactBuilder, KeyCache, PackageTarget, SigningKeyPair};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::exporter::ExportContext;

pub struct Fixture {
    pub temp: TempDir,
    keys: KeyCache,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let keys = KeyCache::new(temp.path().join("keys"));
        keys.write_signing_pair(&SigningKeyPair::generate("core", None).unwrap())
            .unwrap();
        Self { temp, keys }
    }

    pub fn out_dir(&self) -> PathBuf {
        self.temp.path().join("export")
    }

    /// Build a package whose prefix contains the given `(path, content)` files
    pub fn artifact(
        &self,
        ident: &str,
        target: PackageTarget,
        files: &[(&str, &str)],
        run: Option<&str>,
        exposes: Vec<u16>,
    ) -> Artifact {
        let source = self.source_dir(ident);
        for (path, content) in files {
            write_file(&source, path, content);
        }
        self.artifact_from_dir(ident, target, &source, run, exposes)
    }

    /// Prefix directory used for `ident`, for tests that add symlinks
    pub fn source_dir(&self, ident: &str) -> PathBuf {
        let ident: homestead_core::PackageIdent = ident.parse().unwrap();
        self.temp.path().join("src").join(ident.dashed())
    }

    pub fn artifact_from_dir(
        &self,
        ident: &str,
        target: PackageTarget,
        source: &Path,
        run: Option<&str>,
        exposes: Vec<u16>,
    ) -> Artifact {
        let ident: homestead_core::PackageIdent = ident.parse().unwrap();
        let sk = self.keys.secret_signing_key("core", None).unwrap();
        let path = ArtifactBuilder::new(ident, target)
            .run(run.map(str::to_string))
            .exposes(exposes)
            .build(source, &sk, &self.temp.path().join("artifacts"))
            .unwrap();
        Artifact::open(path).unwrap()
    }

    /// `core/redis` exposing 6379 with a `core/glibc` closure
    pub fn redis_context(&self, target: PackageTarget) -> ExportContext {
        let glibc = self.artifact(
            "core/glibc/2.38/20231201000000",
            target,
            &[("lib/libc.so.6", "libc")],
            None,
            vec![],
        );
        let redis = self.artifact(
            "core/redis/7.2.4/20240101120000",
            target,
            &[
                ("bin/redis-server", "#!/bin/sh\necho redis\n"),
                ("etc/redis.conf", "port 6379\n"),
            ],
            Some("bin/redis-server --protected-mode no"),
            vec![6379],
        );
        ExportContext::new(redis, vec![glibc], self.out_dir())
    }
}

pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}
