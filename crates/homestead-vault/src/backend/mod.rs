//! Secret storage backends
//!
//! Backends only ever see sealed values:
//! - **File** (default): one JSON document per origin, readable only by the owner
//! - **Memory**: in-process map for tests

mod file;
mod memory;

pub use file::FileSecretBackend;
pub use memory::{MemorySecretBackend, OperationCounts};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A sealed secret as persisted by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSecret {
    pub name: String,
    /// Sealed value (see `crypto`)
    pub sealed: String,
    pub created: DateTime<Utc>,
}

/// Storage for sealed origin secrets
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Insert a secret unless one with the same name exists
    ///
    /// The check and the insert happen atomically. Returns `false` and leaves
    /// the stored secret untouched when the name is taken.
    async fn put(&self, origin: &str, secret: StoredSecret) -> Result<bool>;

    async fn get(&self, origin: &str, name: &str) -> Result<Option<StoredSecret>>;

    /// All secrets of an origin, sorted by name
    async fn list(&self, origin: &str) -> Result<Vec<StoredSecret>>;

    /// Returns `false` when no secret had that name
    async fn delete(&self, origin: &str, name: &str) -> Result<bool>;

    async fn exists(&self, origin: &str, name: &str) -> Result<bool> {
        Ok(self.get(origin, name).await?.is_some())
    }
}
