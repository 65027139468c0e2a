//! Disk-backed cache store.
//!
//! Layout under the cache root is one directory per namespace. Each entry
//! is a pair of files named by the SHA-256 of the cache key:
//!
//! ```text
//! <root>/shell@1.0.0/<digest>.json   metadata (status, kind, headers)
//! <root>/shell@1.0.0/<digest>.body   raw response body
//! ```
//!
//! Namespace deletion is a directory removal, which keeps activation-time
//! sweeps of stale versions cheap and atomic enough.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::fetch::{CachedResponse, ResponseKind};

use super::store::{CacheHandle, CacheKey, CacheStore};

/// Metadata written alongside each body file.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMetadata {
    key: CacheKey,
    url: String,
    status: u16,
    kind: ResponseKind,
    headers: BTreeMap<String, String>,
    stored_at: DateTime<Utc>,
}

/// File name stem for an entry. Hashing the key keeps arbitrary URLs out
/// of file names.
fn entry_stem(key: &CacheKey) -> String {
    hex::encode(Sha256::digest(key.to_string()))
}

pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create cache root: {}", root.display()))?;
        Ok(Self { root })
    }

    /// Conventional cache root under the platform cache directory, e.g.
    /// `~/.cache/<app_name>` on Linux.
    pub fn default_root(app_name: &str) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(app_name))
    }

    /// Namespaces become directory names, so anything that could walk out
    /// of the root is refused outright.
    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        if namespace.is_empty()
            || namespace == "."
            || namespace == ".."
            || namespace.contains('/')
            || namespace.contains('\\')
        {
            bail!("invalid cache namespace: {:?}", namespace);
        }
        Ok(self.root.join(namespace))
    }
}

struct DiskHandle {
    dir: PathBuf,
}

impl DiskHandle {
    fn meta_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", entry_stem(key)))
    }

    fn body_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.body", entry_stem(key)))
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn open(&self, namespace: &str) -> Result<Arc<dyn CacheHandle>> {
        let dir = self.namespace_dir(namespace)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create cache namespace: {}", namespace))?;
        Ok(Arc::new(DiskHandle { dir }))
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("Failed to read cache root: {}", self.root.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                match entry.file_name().into_string() {
                    Ok(name) => names.push(name),
                    Err(name) => {
                        warn!(name = ?name, "skipping non-UTF-8 cache directory");
                    }
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn remove(&self, namespace: &str) -> Result<bool> {
        let dir = self.namespace_dir(namespace)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to delete cache namespace: {}", namespace))
            }
        }
    }
}

#[async_trait]
impl CacheHandle for DiskHandle {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>> {
        let meta_path = self.meta_path(key);
        let raw = match tokio::fs::read(&meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read cache metadata for {}", key));
            }
        };

        let meta: EntryMetadata = match serde_json::from_slice(&raw) {
            Ok(meta) => meta,
            Err(error) => {
                warn!(key = %key, error = %error, "discarding unreadable cache metadata");
                return Ok(None);
            }
        };

        let body = match tokio::fs::read(self.body_path(key)).await {
            Ok(body) => Bytes::from(body),
            Err(error) => {
                warn!(key = %key, error = %error, "cache entry has no readable body");
                return Ok(None);
            }
        };

        let age_minutes = (Utc::now() - meta.stored_at).num_minutes();
        debug!(key = %key, age_minutes, "disk cache hit");

        Ok(Some(CachedResponse {
            url: meta.url,
            status: meta.status,
            kind: meta.kind,
            headers: meta.headers,
            body,
        }))
    }

    async fn put(&self, key: &CacheKey, snapshot: CachedResponse) -> Result<()> {
        let meta = EntryMetadata {
            key: key.clone(),
            url: snapshot.url,
            status: snapshot.status,
            kind: snapshot.kind,
            headers: snapshot.headers,
            stored_at: Utc::now(),
        };

        // Body first, metadata second. Lookups require the metadata file,
        // so an interrupted write leaves a stray body, not a broken entry.
        tokio::fs::write(self.body_path(key), &snapshot.body)
            .await
            .with_context(|| format!("Failed to write cache body for {}", key))?;

        let contents = serde_json::to_string_pretty(&meta)?;
        tokio::fs::write(self.meta_path(key), contents)
            .await
            .with_context(|| format!("Failed to write cache metadata for {}", key))?;

        Ok(())
    }
}
