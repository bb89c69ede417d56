//! Sealed boxes for origin secrets
//!
//! A value is sealed to an origin's X25519 public key with a fresh ephemeral
//! key pair. The shared secret is hashed into a ChaCha20-Poly1305 key, so
//! only the holder of the origin's secret key can open it.
//!
//! Wire format: `hsbox1:` followed by base64 of
//! `ephemeral public key (32) || nonce (12) || ciphertext`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{Result, VaultError};

const SEALED_PREFIX: &str = "hsbox1:";
const KDF_CONTEXT: &[u8] = b"homestead sealed box v1";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

fn derive_key(shared: &[u8; 32], ephemeral: &PublicKey, recipient: &PublicKey) -> [u8; KEY_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(KDF_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral.as_bytes());
    hasher.update(recipient.as_bytes());
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&hasher.finalize());
    key
}

/// Seal `plaintext` so only the owner of `recipient` can open it
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<String> {
    let ephemeral_secret = StaticSecret::from(rand::random::<[u8; 32]>());
    let ephemeral_public = PublicKey::from(&ephemeral_secret);
    let shared = ephemeral_secret.diffie_hellman(recipient);
    let key = derive_key(shared.as_bytes(), &ephemeral_public, recipient);

    let nonce = rand::random::<[u8; NONCE_LEN]>();
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| VaultError::Seal {
            message: e.to_string(),
        })?;

    let mut sealed = Vec::with_capacity(32 + NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(format!("{}{}", SEALED_PREFIX, STANDARD.encode(sealed)))
}

/// Open a sealed value with the recipient's secret key
///
/// `name` is only used in error messages.
pub fn open(secret: &StaticSecret, sealed: &str, name: &str) -> Result<Vec<u8>> {
    let fail = |message: &str| VaultError::Open {
        name: name.to_string(),
        message: message.to_string(),
    };

    let encoded = sealed
        .strip_prefix(SEALED_PREFIX)
        .ok_or_else(|| fail("unknown sealed box format"))?;
    let raw = STANDARD
        .decode(encoded)
        .map_err(|_| fail("sealed box is not valid base64"))?;
    if raw.len() < 32 + NONCE_LEN {
        return Err(fail("sealed box is truncated"));
    }

    let (epk, rest) = raw.split_at(32);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    let epk: [u8; 32] = epk
        .try_into()
        .map_err(|_| fail("invalid ephemeral key"))?;
    let ephemeral_public = PublicKey::from(epk);
    let recipient = PublicKey::from(secret);

    let shared = secret.diffie_hellman(&ephemeral_public);
    let key = derive_key(shared.as_bytes(), &ephemeral_public, &recipient);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| fail("decryption failed (wrong origin key or corrupted value)"))
}
