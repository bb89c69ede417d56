//! Origin-scoped secret vault
//!
//! Values are sealed to the origin's public encryption key before they reach
//! a backend, so a backend only ever holds ciphertext. Plaintext comes back
//! exclusively through [`Vault::decrypt_for_build`], which requires the
//! origin's secret key.

use chrono::{DateTime, Utc};
use homestead_core::EncryptionKeyPair;
use std::collections::BTreeMap;
use std::fmt;
use x25519_dalek::PublicKey;

use crate::backend::{SecretBackend, StoredSecret};
use crate::crypto;
use crate::error::{Result, VaultError};
use crate::name::SecretName;

/// Checks that a token grants access to an origin
pub trait Authorizer {
    fn authorize(&self, origin: &str, token: &str) -> Result<()>;
}

/// Name and creation time of a stored secret; never the value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSummary {
    pub name: String,
    pub created: DateTime<Utc>,
}

impl From<&StoredSecret> for SecretSummary {
    fn from(secret: &StoredSecret) -> Self {
        Self {
            name: secret.name.clone(),
            created: secret.created,
        }
    }
}

/// Decrypted secrets for a single build job
///
/// Values are only reachable through [`BuildSecrets::env`] and
/// [`BuildSecrets::get`]; `Debug` prints names alone.
#[derive(Clone, Default)]
pub struct BuildSecrets {
    values: BTreeMap<String, String>,
}

impl BuildSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// `(name, value)` pairs to inject into a build environment
    pub fn env(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for BuildSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

impl FromIterator<(String, String)> for BuildSecrets {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Secret vault over a storage backend
pub struct Vault<B, A> {
    backend: B,
    authorizer: A,
}

impl<B: SecretBackend, A: Authorizer> Vault<B, A> {
    pub fn new(backend: B, authorizer: A) -> Self {
        Self {
            backend,
            authorizer,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Seal `value` to the origin's public key and store it
    ///
    /// An existing secret with the same name is never overwritten.
    pub async fn upload(
        &self,
        origin: &str,
        token: &str,
        name: &str,
        value: &str,
        public_key: &PublicKey,
    ) -> Result<SecretSummary> {
        self.authorizer.authorize(origin, token)?;
        let name: SecretName = name.parse()?;

        let secret = StoredSecret {
            name: name.to_string(),
            sealed: crypto::seal(public_key, value.as_bytes())?,
            created: Utc::now(),
        };
        let summary = SecretSummary::from(&secret);
        if !self.backend.put(origin, secret).await? {
            return Err(VaultError::SecretExists {
                origin: origin.to_string(),
                name: name.to_string(),
            });
        }

        tracing::debug!(origin, secret = %name, "stored secret");
        Ok(summary)
    }

    /// Names and timestamps of the origin's secrets, sorted by name
    pub async fn list(&self, origin: &str, token: &str) -> Result<Vec<SecretSummary>> {
        self.authorizer.authorize(origin, token)?;
        let mut summaries: Vec<SecretSummary> = self
            .backend
            .list(origin)
            .await?
            .iter()
            .map(SecretSummary::from)
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    pub async fn delete(&self, origin: &str, token: &str, name: &str) -> Result<()> {
        self.authorizer.authorize(origin, token)?;
        if self.backend.delete(origin, name).await? {
            tracing::debug!(origin, secret = name, "deleted secret");
            Ok(())
        } else {
            Err(VaultError::SecretNotFound {
                origin: origin.to_string(),
                name: name.to_string(),
            })
        }
    }

    /// Open every secret of `origin` for a build job
    pub async fn decrypt_for_build(
        &self,
        origin: &str,
        keys: &EncryptionKeyPair,
    ) -> Result<BuildSecrets> {
        if keys.origin != origin {
            return Err(VaultError::KeyMismatch {
                origin: origin.to_string(),
                key_origin: keys.origin.clone(),
            });
        }

        let mut values = BTreeMap::new();
        for secret in self.backend.list(origin).await? {
            let plain = crypto::open(keys.secret(), &secret.sealed, &secret.name)?;
            let value = String::from_utf8(plain).map_err(|_| VaultError::Open {
                name: secret.name.clone(),
                message: "value is not valid UTF-8".to_string(),
            })?;
            values.insert(secret.name, value);
        }

        tracing::debug!(origin, count = values.len(), "decrypted build secrets");
        Ok(BuildSecrets { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemorySecretBackend;
    use std::collections::HashMap;

    struct StaticTokens(HashMap<String, String>);

    impl Authorizer for StaticTokens {
        fn authorize(&self, origin: &str, token: &str) -> Result<()> {
            match self.0.get(origin) {
                None => Err(VaultError::OriginNotFound {
                    origin: origin.to_string(),
                }),
                Some(expected) if expected == token => Ok(()),
                Some(_) => Err(VaultError::Unauthorized {
                    origin: origin.to_string(),
                }),
            }
        }
    }

    fn vault() -> (Vault<MemorySecretBackend, StaticTokens>, EncryptionKeyPair) {
        let tokens = StaticTokens(HashMap::from([("core".to_string(), "tok".to_string())]));
        let keys = EncryptionKeyPair::generate("core").unwrap();
        (Vault::new(MemorySecretBackend::new(), tokens), keys)
    }

    #[tokio::test]
    async fn test_upload_list_decrypt() {
        let (vault, keys) = vault();
        vault
            .upload("core", "tok", "ZETA", "z-value", keys.public())
            .await
            .unwrap();
        vault
            .upload("core", "tok", "ALPHA", "a-value", keys.public())
            .await
            .unwrap();

        let names: Vec<String> = vault
            .list("core", "tok")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["ALPHA", "ZETA"]);

        let secrets = vault.decrypt_for_build("core", &keys).await.unwrap();
        assert_eq!(secrets.get("ALPHA"), Some("a-value"));
        let env: Vec<(&str, &str)> = secrets.env().collect();
        assert_eq!(env, vec![("ALPHA", "a-value"), ("ZETA", "z-value")]);
    }

    #[tokio::test]
    async fn test_backend_holds_only_ciphertext() {
        let (vault, keys) = vault();
        vault
            .upload("core", "tok", "TOKEN", "plain-text-value", keys.public())
            .await
            .unwrap();

        for (_, secret) in vault.backend().all_secrets().await {
            assert!(!secret.sealed.contains("plain-text-value"));
        }
    }

    #[tokio::test]
    async fn test_upload_existing_name() {
        let (vault, keys) = vault();
        vault
            .upload("core", "tok", "TOKEN", "one", keys.public())
            .await
            .unwrap();
        assert!(matches!(
            vault.upload("core", "tok", "TOKEN", "two", keys.public()).await,
            Err(VaultError::SecretExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_uploads_of_same_name() {
        let (vault, keys) = vault();
        let (first, second) = tokio::join!(
            vault.upload("core", "tok", "TOKEN", "one", keys.public()),
            vault.upload("core", "tok", "TOKEN", "two", keys.public()),
        );

        let outcomes = [first.is_ok(), second.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        assert!(
            matches!(first, Err(VaultError::SecretExists { .. }))
                || matches!(second, Err(VaultError::SecretExists { .. }))
        );

        let winner = if outcomes[0] { "one" } else { "two" };
        let secrets = vault.decrypt_for_build("core", &keys).await.unwrap();
        assert_eq!(secrets.get("TOKEN"), Some(winner));
    }

    #[tokio::test]
    async fn test_authorization() {
        let (vault, keys) = vault();
        assert!(matches!(
            vault.upload("core", "bad", "TOKEN", "v", keys.public()).await,
            Err(VaultError::Unauthorized { .. })
        ));
        assert!(matches!(
            vault.list("acme", "tok").await,
            Err(VaultError::OriginNotFound { .. })
        ));
        assert_eq!(vault.backend().operation_counts().puts, 0);
    }

    #[tokio::test]
    async fn test_invalid_name() {
        let (vault, keys) = vault();
        assert!(matches!(
            vault.upload("core", "tok", "HS_PKG_NAME", "v", keys.public()).await,
            Err(VaultError::InvalidSecretName { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let (vault, keys) = vault();
        vault
            .upload("core", "tok", "TOKEN", "v", keys.public())
            .await
            .unwrap();
        vault.delete("core", "tok", "TOKEN").await.unwrap();
        assert!(matches!(
            vault.delete("core", "tok", "TOKEN").await,
            Err(VaultError::SecretNotFound { .. })
        ));
        assert!(vault.list("core", "tok").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrypt_with_wrong_origin_key() {
        let (vault, _) = vault();
        let other = EncryptionKeyPair::generate("acme").unwrap();
        assert!(matches!(
            vault.decrypt_for_build("core", &other).await,
            Err(VaultError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn test_build_secrets_debug_is_redacted() {
        let secrets: BuildSecrets = [("TOKEN".to_string(), "hunter2".to_string())]
            .into_iter()
            .collect();
        let debug = format!("{:?}", secrets);
        assert!(debug.contains("TOKEN"));
        assert!(!debug.contains("hunter2"));
    }
}
