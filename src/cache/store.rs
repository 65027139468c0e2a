//! Cache capability traits and entry identity.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::fetch::{CachedResponse, FetchRequest};

/// Identity of a cached entry: method plus absolute URL.
///
/// Keys always carry the absolute URL form, so entries written during
/// pre-warming are found again by intercepted requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
        }
    }

    pub fn from_request(request: &FetchRequest) -> Self {
        Self {
            method: request.method.clone(),
            url: request.url.clone(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// One open cache namespace.
#[async_trait]
pub trait CacheHandle: Send + Sync {
    /// Look up a stored snapshot. A missing entry is `Ok(None)`, never an
    /// error; errors mean the store itself failed.
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>>;

    /// Store a snapshot, replacing any previous entry for the key.
    async fn put(&self, key: &CacheKey, snapshot: CachedResponse) -> Result<()>;
}

/// A collection of named cache namespaces.
///
/// Namespaces are named `name@version`. Opening one creates it if it does
/// not exist, matching how pages open caches on demand.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn open(&self, namespace: &str) -> Result<Arc<dyn CacheHandle>>;

    /// All namespaces currently present, sorted by name.
    async fn namespaces(&self) -> Result<Vec<String>>;

    /// Delete a namespace and everything in it. Returns whether it existed.
    async fn remove(&self, namespace: &str) -> Result<bool>;
}
