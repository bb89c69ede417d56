//! In-memory secret backend for testing

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{SecretBackend, StoredSecret};
use crate::error::Result;

/// In-memory backend; clones share the same storage
#[derive(Clone, Default)]
pub struct MemorySecretBackend {
    /// origin -> name -> secret
    store: Arc<RwLock<HashMap<String, BTreeMap<String, StoredSecret>>>>,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    puts: AtomicUsize,
    gets: AtomicUsize,
    lists: AtomicUsize,
    deletes: AtomicUsize,
}

/// Counts of operations performed, for test assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub puts: usize,
    pub gets: usize,
    pub lists: usize,
    pub deletes: usize,
}

impl MemorySecretBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation_counts(&self) -> OperationCounts {
        OperationCounts {
            puts: self.counters.puts.load(Ordering::Relaxed),
            gets: self.counters.gets.load(Ordering::Relaxed),
            lists: self.counters.lists.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
        }
    }

    /// Every stored secret across origins
    pub async fn all_secrets(&self) -> Vec<(String, StoredSecret)> {
        let store = self.store.read().await;
        store
            .iter()
            .flat_map(|(origin, secrets)| {
                secrets
                    .values()
                    .map(move |s| (origin.clone(), s.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl SecretBackend for MemorySecretBackend {
    async fn put(&self, origin: &str, secret: StoredSecret) -> Result<bool> {
        self.counters.puts.fetch_add(1, Ordering::Relaxed);
        let mut store = self.store.write().await;
        let secrets = store.entry(origin.to_string()).or_default();
        if secrets.contains_key(&secret.name) {
            return Ok(false);
        }
        secrets.insert(secret.name.clone(), secret);
        Ok(true)
    }

    async fn get(&self, origin: &str, name: &str) -> Result<Option<StoredSecret>> {
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        let store = self.store.read().await;
        Ok(store.get(origin).and_then(|s| s.get(name)).cloned())
    }

    async fn list(&self, origin: &str) -> Result<Vec<StoredSecret>> {
        self.counters.lists.fetch_add(1, Ordering::Relaxed);
        let store = self.store.read().await;
        Ok(store
            .get(origin)
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, origin: &str, name: &str) -> Result<bool> {
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        let mut store = self.store.write().await;
        Ok(store
            .get_mut(origin)
            .and_then(|s| s.remove(name))
            .is_some())
    }
}
