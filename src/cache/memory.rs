//! In-process cache store.
//!
//! Backs tests and embedded hosts that do not want cached responses to
//! outlive the process. All namespaces share one map behind an async
//! read-write lock.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::fetch::CachedResponse;

use super::store::{CacheHandle, CacheKey, CacheStore};

type Namespaces = HashMap<String, HashMap<CacheKey, CachedResponse>>;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Namespaces>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a namespace. Zero if the namespace does not
    /// exist.
    pub async fn entry_count(&self, namespace: &str) -> usize {
        self.inner
            .read()
            .await
            .get(namespace)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

struct MemoryHandle {
    namespace: String,
    inner: Arc<RwLock<Namespaces>>,
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, namespace: &str) -> Result<Arc<dyn CacheHandle>> {
        self.inner
            .write()
            .await
            .entry(namespace.to_string())
            .or_default();

        Ok(Arc::new(MemoryHandle {
            namespace: namespace.to_string(),
            inner: Arc::clone(&self.inner),
        }))
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.inner.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn remove(&self, namespace: &str) -> Result<bool> {
        Ok(self.inner.write().await.remove(namespace).is_some())
    }
}

#[async_trait]
impl CacheHandle for MemoryHandle {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(&self.namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, key: &CacheKey, snapshot: CachedResponse) -> Result<()> {
        let mut guard = self.inner.write().await;
        // A handle left over from before the namespace was swept must not
        // resurrect it.
        match guard.get_mut(&self.namespace) {
            Some(entries) => {
                entries.insert(key.clone(), snapshot);
                Ok(())
            }
            None => bail!("cache namespace {} no longer exists", self.namespace),
        }
    }
}
