//! Origin key material
//!
//! Every origin owns two key pairs:
//!
//! - a **signing** pair (minisign) used to sign and verify artifacts
//! - an **encryption** pair (X25519) used to seal origin secrets
//!
//! Both live in a key cache directory as plain text files:
//!
//! | File                 | Contents                          |
//! |----------------------|-----------------------------------|
//! | `<origin>.sig.key`   | minisign secret key box (0600)    |
//! | `<origin>.pub`       | minisign public key box           |
//! | `<origin>.box.key`   | X25519 secret key (0600)          |
//! | `<origin>.box.pub`   | X25519 public key                 |

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use minisign::{KeyPair, PublicKey, PublicKeyBox, SecretKey, SecretKeyBox};
use std::fmt;
use std::path::{Path, PathBuf};
use x25519_dalek::{PublicKey as BoxPublicKey, StaticSecret};

use crate::error::{CoreError, Result};
use crate::ident::validate_origin;

const BOX_SECRET_HEADER: &str = "HOMESTEAD-BOX-SEC-1";
const BOX_PUBLIC_HEADER: &str = "HOMESTEAD-BOX-PUB-1";

/// A freshly generated minisign key pair, as serialized key boxes
pub struct SigningKeyPair {
    pub origin: String,
    public_box: String,
    secret_box: String,
    pub password_protected: bool,
}

impl SigningKeyPair {
    /// Generate a signing pair, encrypting the secret key when a password is given
    pub fn generate(origin: &str, password: Option<String>) -> Result<Self> {
        validate_origin(origin)?;
        let password = password.filter(|p| !p.is_empty());
        let password_protected = password.is_some();

        let KeyPair { pk, sk } = match password {
            Some(password) => KeyPair::generate_encrypted_keypair(Some(password)),
            None => KeyPair::generate_unencrypted_keypair(),
        }
        .map_err(|e| signing_error(e.to_string()))?;

        let comment = format!("homestead origin {}", origin);
        let public_box = pk
            .to_box()
            .map_err(|e| signing_error(e.to_string()))?
            .to_string();
        let secret_box = sk
            .to_box(Some(&comment))
            .map_err(|e| signing_error(e.to_string()))?
            .to_string();

        Ok(Self {
            origin: origin.to_string(),
            public_box,
            secret_box,
            password_protected,
        })
    }

    pub fn public_box(&self) -> &str {
        &self.public_box
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("origin", &self.origin)
            .field("password_protected", &self.password_protected)
            .finish_non_exhaustive()
    }
}

/// X25519 key pair used to seal and open origin secrets
#[derive(Clone)]
pub struct EncryptionKeyPair {
    pub origin: String,
    secret: StaticSecret,
    public: BoxPublicKey,
}

impl EncryptionKeyPair {
    pub fn generate(origin: &str) -> Result<Self> {
        validate_origin(origin)?;
        let secret = StaticSecret::from(rand::random::<[u8; 32]>());
        let public = BoxPublicKey::from(&secret);
        Ok(Self {
            origin: origin.to_string(),
            secret,
            public,
        })
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    pub fn public(&self) -> &BoxPublicKey {
        &self.public
    }

    fn secret_text(&self) -> String {
        format!(
            "{}\n{}\n{}\n",
            BOX_SECRET_HEADER,
            self.origin,
            STANDARD.encode(self.secret.to_bytes())
        )
    }
}

impl fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeyPair")
            .field("origin", &self.origin)
            .field("public", &STANDARD.encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}

fn public_box_text(origin: &str, public: &BoxPublicKey) -> String {
    format!(
        "{}\n{}\n{}\n",
        BOX_PUBLIC_HEADER,
        origin,
        STANDARD.encode(public.as_bytes())
    )
}

/// Parse `<header>\n<origin>\n<base64>` and return the 32 key bytes
fn parse_box_text(content: &str, header: &str, origin: &str) -> Result<[u8; 32]> {
    let invalid = |message: String| CoreError::InvalidKey {
        kind: "encryption".to_string(),
        message,
    };

    let mut lines = content.lines().map(str::trim);
    match lines.next() {
        Some(h) if h == header => {}
        other => {
            return Err(invalid(format!(
                "expected header {}, found {:?}",
                header, other
            )));
        }
    }
    match lines.next() {
        Some(o) if o == origin => {}
        other => {
            return Err(invalid(format!(
                "key belongs to {:?}, expected origin {}",
                other, origin
            )));
        }
    }
    let encoded = lines
        .next()
        .ok_or_else(|| invalid("missing key material".to_string()))?;
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| invalid(format!("base64: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| invalid("key must be 32 bytes".to_string()))
}

fn signing_error(message: String) -> CoreError {
    CoreError::InvalidKey {
        kind: "signing".to_string(),
        message,
    }
}

/// Directory holding origin keys
#[derive(Debug, Clone)]
pub struct KeyCache {
    dir: PathBuf,
}

impl KeyCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.homestead/cache/keys`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".homestead"))
            .unwrap_or_else(|| PathBuf::from(".homestead"))
            .join("cache")
            .join("keys")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn signing_secret_path(&self, origin: &str) -> PathBuf {
        self.dir.join(format!("{}.sig.key", origin))
    }

    pub fn signing_public_path(&self, origin: &str) -> PathBuf {
        self.dir.join(format!("{}.pub", origin))
    }

    pub fn encryption_secret_path(&self, origin: &str) -> PathBuf {
        self.dir.join(format!("{}.box.key", origin))
    }

    pub fn encryption_public_path(&self, origin: &str) -> PathBuf {
        self.dir.join(format!("{}.box.pub", origin))
    }

    /// Write both halves of a signing pair, returning (secret, public) paths
    pub fn write_signing_pair(&self, pair: &SigningKeyPair) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(&self.dir)?;
        let secret_path = self.signing_secret_path(&pair.origin);
        let public_path = self.signing_public_path(&pair.origin);
        write_private(&secret_path, &pair.secret_box)?;
        std::fs::write(&public_path, &pair.public_box)?;
        tracing::debug!(origin = %pair.origin, path = %secret_path.display(), "wrote signing keys");
        Ok((secret_path, public_path))
    }

    /// Write both halves of an encryption pair, returning (secret, public) paths
    pub fn write_encryption_pair(&self, pair: &EncryptionKeyPair) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(&self.dir)?;
        let secret_path = self.encryption_secret_path(&pair.origin);
        let public_path = self.encryption_public_path(&pair.origin);
        write_private(&secret_path, &pair.secret_text())?;
        std::fs::write(&public_path, public_box_text(&pair.origin, &pair.public))?;
        tracing::debug!(origin = %pair.origin, path = %secret_path.display(), "wrote encryption keys");
        Ok((secret_path, public_path))
    }

    /// Whether a signing secret key exists for the origin
    pub fn has_signing_key(&self, origin: &str) -> bool {
        self.signing_secret_path(origin).exists()
    }

    pub fn public_signing_key(&self, origin: &str) -> Result<PublicKey> {
        let content = read_key(&self.signing_public_path(origin), origin, "public signing")?;
        PublicKeyBox::from_string(&content)
            .and_then(|b| b.into_public_key())
            .map_err(|e| signing_error(e.to_string()))
    }

    /// Load the secret signing key
    ///
    /// Unencrypted keys load without a password. Encrypted keys require one
    /// and yield [`CoreError::KeyLocked`] when none is given.
    pub fn secret_signing_key(&self, origin: &str, password: Option<String>) -> Result<SecretKey> {
        let content = read_key(&self.signing_secret_path(origin), origin, "secret signing")?;
        let sk_box =
            SecretKeyBox::from_string(&content).map_err(|e| signing_error(e.to_string()))?;

        if let Ok(sk) = sk_box.clone().into_unencrypted_secret_key() {
            return Ok(sk);
        }

        match password {
            Some(password) => sk_box
                .into_secret_key(Some(password))
                .map_err(|e| signing_error(format!("failed to decrypt key: {}", e))),
            None => Err(CoreError::KeyLocked {
                origin: origin.to_string(),
            }),
        }
    }

    pub fn public_encryption_key(&self, origin: &str) -> Result<BoxPublicKey> {
        let content = read_key(&self.encryption_public_path(origin), origin, "public encryption")?;
        let bytes = parse_box_text(&content, BOX_PUBLIC_HEADER, origin)?;
        Ok(BoxPublicKey::from(bytes))
    }

    pub fn encryption_pair(&self, origin: &str) -> Result<EncryptionKeyPair> {
        let content = read_key(&self.encryption_secret_path(origin), origin, "secret encryption")?;
        let bytes = parse_box_text(&content, BOX_SECRET_HEADER, origin)?;
        let secret = StaticSecret::from(bytes);
        let public = BoxPublicKey::from(&secret);
        Ok(EncryptionKeyPair {
            origin: origin.to_string(),
            secret,
            public,
        })
    }
}

fn read_key(path: &Path, origin: &str, kind: &str) -> Result<String> {
    if !path.exists() {
        return Err(CoreError::KeyNotFound {
            origin: origin.to_string(),
            kind: kind.to_string(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Write a file readable only by the owner on Unix
fn write_private(path: &Path, content: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true).mode(0o600);
        options.open(path)?.write_all(content.as_bytes())?;
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
    use tempfile::TempDir;

    #[test]
    fn test_signing_pair_unencrypted() {
        let temp = TempDir::new().unwrap();
        let cache = KeyCache::new(temp.path());

        let pair = SigningKeyPair::generate("core", None).unwrap();
        assert!(!pair.password_protected);
        cache.write_signing_pair(&pair).unwrap();

        assert!(cache.has_signing_key("core"));
        cache.public_signing_key("core").unwrap();
        cache.secret_signing_key("core", None).unwrap();
    }

    #[test]
    fn test_signing_pair_password_protected() {
        let temp = TempDir::new().unwrap();
        let cache = KeyCache::new(temp.path());

        let pair = SigningKeyPair::generate("core", Some("hunter2".to_string())).unwrap();
        assert!(pair.password_protected);
        cache.write_signing_pair(&pair).unwrap();

        assert!(matches!(
            cache.secret_signing_key("core", None),
            Err(CoreError::KeyLocked { .. })
        ));
        cache
            .secret_signing_key("core", Some("hunter2".to_string()))
            .unwrap();
    }

    #[test]
    fn test_encryption_pair_roundtrip() {
        let temp = TempDir::new().unwrap();
        let cache = KeyCache::new(temp.path());

        let pair = EncryptionKeyPair::generate("core").unwrap();
        cache.write_encryption_pair(&pair).unwrap();

        let public = cache.public_encryption_key("core").unwrap();
        assert_eq!(public.as_bytes(), pair.public().as_bytes());

        let loaded = cache.encryption_pair("core").unwrap();
        assert_eq!(loaded.secret().to_bytes(), pair.secret().to_bytes());
    }

    #[test]
    fn test_missing_keys() {
        let temp = TempDir::new().unwrap();
        let cache = KeyCache::new(temp.path());

        assert!(matches!(
            cache.public_signing_key("nobody"),
            Err(CoreError::KeyNotFound { .. })
        ));
        assert!(matches!(
            cache.encryption_pair("nobody"),
            Err(CoreError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_encryption_key_origin_mismatch() {
        let temp = TempDir::new().unwrap();
        let cache = KeyCache::new(temp.path());

        let pair = EncryptionKeyPair::generate("core").unwrap();
        cache.write_encryption_pair(&pair).unwrap();
        std::fs::copy(
            cache.encryption_public_path("core"),
            cache.encryption_public_path("acme"),
        )
        .unwrap();

        assert!(matches!(
            cache.public_encryption_key("acme"),
            Err(CoreError::InvalidKey { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let cache = KeyCache::new(temp.path());
        let pair = EncryptionKeyPair::generate("core").unwrap();
        let (secret, _) = cache.write_encryption_pair(&pair).unwrap();

        let mode = std::fs::metadata(secret).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
