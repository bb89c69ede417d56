//! Homestead Vault - per-origin secrets for build jobs
//!
//! Secrets are sealed with the origin's X25519 public key before storage and
//! opened only when a build job runs. Storage is pluggable via
//! [`SecretBackend`]; access control via [`Authorizer`].

pub mod backend;
pub mod crypto;
pub mod error;
pub mod name;
pub mod vault;

pub use backend::{
    FileSecretBackend, MemorySecretBackend, OperationCounts, SecretBackend, StoredSecret,
};
pub use error::{Result, VaultError};
pub use name::{RESERVED_PREFIX, SecretName};
pub use vault::{Authorizer, BuildSecrets, SecretSummary, Vault};
