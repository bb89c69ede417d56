//! File-based secret backend
//!
//! Stores `<root>/secrets/<origin>.json`, written with mode 0600. Writers
//! hold an exclusive lock on `<origin>.lock` for the whole read-modify-write,
//! so concurrent processes never lose each other's updates.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{SecretBackend, StoredSecret};
use crate::error::Result;

type OriginSecrets = BTreeMap<String, StoredSecret>;

pub struct FileSecretBackend {
    dir: PathBuf,
    /// Serializes read-modify-write cycles within the process
    write_lock: Mutex<()>,
}

impl FileSecretBackend {
    /// Backend storing files under `<root>/secrets`
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let dir = root.as_ref().join("secrets");
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn origin_path(&self, origin: &str) -> PathBuf {
        self.dir.join(format!("{}.json", origin))
    }

    /// Exclusive advisory lock for one origin, released on drop
    fn lock_origin(&self, origin: &str) -> Result<std::fs::File> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(format!("{}.lock", origin)))?;
        file.lock()?;
        Ok(file)
    }

    fn read_origin(&self, origin: &str) -> Result<OriginSecrets> {
        let path = self.origin_path(origin);
        if !path.exists() {
            return Ok(OriginSecrets::new());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_origin(&self, origin: &str, secrets: &OriginSecrets) -> Result<()> {
        let path = self.origin_path(origin);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(secrets)?;
        write_private(&tmp, &content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[async_trait]
impl SecretBackend for FileSecretBackend {
    async fn put(&self, origin: &str, secret: StoredSecret) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let _lock = self.lock_origin(origin)?;
        let mut secrets = self.read_origin(origin)?;
        if secrets.contains_key(&secret.name) {
            return Ok(false);
        }
        secrets.insert(secret.name.clone(), secret);
        self.write_origin(origin, &secrets)?;
        Ok(true)
    }

    async fn get(&self, origin: &str, name: &str) -> Result<Option<StoredSecret>> {
        Ok(self.read_origin(origin)?.remove(name))
    }

    async fn list(&self, origin: &str) -> Result<Vec<StoredSecret>> {
        Ok(self.read_origin(origin)?.into_values().collect())
    }

    async fn delete(&self, origin: &str, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let _lock = self.lock_origin(origin)?;
        let mut secrets = self.read_origin(origin)?;
        if secrets.remove(name).is_none() {
            return Ok(false);
        }
        self.write_origin(origin, &secrets)?;
        Ok(true)
    }
}

/// Write a file readable only by the owner on Unix
fn write_private(path: &Path, content: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn secret(name: &str) -> StoredSecret {
        StoredSecret {
            name: name.to_string(),
            sealed: format!("hsbox1:{}", name),
            created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_get_list() {
        let temp = TempDir::new().unwrap();
        let backend = FileSecretBackend::new(temp.path()).unwrap();

        backend.put("core", secret("ZETA")).await.unwrap();
        backend.put("core", secret("ALPHA")).await.unwrap();
        backend.put("acme", secret("OTHER")).await.unwrap();

        let names: Vec<String> = backend
            .list("core")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["ALPHA", "ZETA"]);

        assert!(backend.get("core", "OTHER").await.unwrap().is_none());
        assert!(backend.exists("acme", "OTHER").await.unwrap());
        assert!(backend.list("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let temp = TempDir::new().unwrap();
        let backend = FileSecretBackend::new(temp.path()).unwrap();

        backend.put("core", secret("TOKEN")).await.unwrap();
        assert!(backend.delete("core", "TOKEN").await.unwrap());
        assert!(!backend.delete("core", "TOKEN").await.unwrap());
        assert!(backend.list("core").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_keeps_existing() {
        let temp = TempDir::new().unwrap();
        let backend = FileSecretBackend::new(temp.path()).unwrap();

        assert!(backend.put("core", secret("TOKEN")).await.unwrap());
        let mut replacement = secret("TOKEN");
        replacement.sealed = "hsbox1:other".to_string();
        assert!(!backend.put("core", replacement).await.unwrap());

        let stored = backend.get("core", "TOKEN").await.unwrap().unwrap();
        assert_eq!(stored.sealed, "hsbox1:TOKEN");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_instances_keep_every_secret() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();

        let mut handles = Vec::new();
        for i in 0..16 {
            let root = root.clone();
            handles.push(tokio::spawn(async move {
                let backend = FileSecretBackend::new(&root).unwrap();
                backend
                    .put("core", secret(&format!("SECRET_{}", i)))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let backend = FileSecretBackend::new(&root).unwrap();
        assert_eq!(backend.list("core").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        FileSecretBackend::new(temp.path())
            .unwrap()
            .put("core", secret("TOKEN"))
            .await
            .unwrap();

        let reopened = FileSecretBackend::new(temp.path()).unwrap();
        assert!(reopened.exists("core", "TOKEN").await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let backend = FileSecretBackend::new(temp.path()).unwrap();
        backend.put("core", secret("TOKEN")).await.unwrap();

        let mode = std::fs::metadata(backend.dir().join("core.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
