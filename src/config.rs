//! Worker configuration.
//!
//! Everything the routing and lifecycle logic branches on lives here:
//! the versioned cache name, the origin being served, the precache
//! manifest, and the URL pattern lists that drive request classification.
//!
//! Configuration is built in code by the host or loaded from a JSON file
//! produced at deploy time. It is validated once, up front; nothing else
//! in the crate re-checks it.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Characters allowed in a cache name besides ASCII alphanumerics.
/// The name doubles as a directory name in disk-backed stores.
const CACHE_NAME_EXTRA_CHARS: &[char] = &['@', '.', '_', '-'];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Versioned cache namespace, `name@version`. Bumping the version is
    /// what retires every previously cached response.
    pub cache_name: String,

    /// Origin this worker serves, e.g. `https://app.example.com`.
    pub origin: String,

    /// Shell assets fetched and cached during installation, as absolute
    /// paths or full URLs.
    #[serde(default)]
    pub precache: Vec<String>,

    /// Documents that must never be served stale while online. Matched by
    /// substring against the request URL.
    #[serde(default)]
    pub entry_documents: Vec<String>,

    /// Path of the precached document served when a navigation has no
    /// network and no cached copy.
    pub fallback_document: String,

    /// URL substrings identifying live API traffic the cache must never
    /// touch.
    #[serde(default)]
    pub api_prefixes: Vec<String>,

    /// Host substrings identifying presigned or short-lived media URLs,
    /// also never cached.
    #[serde(default)]
    pub media_hosts: Vec<String>,

    /// Host substrings of content CDNs whose responses are always worth
    /// caching regardless of resource kind.
    #[serde(default)]
    pub cdn_hosts: Vec<String>,

    /// Opt in to caching opaque responses from `cdn_hosts`. Off by
    /// default: an opaque response hides its status, so caching one can
    /// pin an error page for the namespace lifetime.
    #[serde(default)]
    pub cache_opaque_from_cdn: bool,
}

impl WorkerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: WorkerConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Check the whole configuration. Called once when a worker is built.
    pub fn validate(&self) -> Result<()> {
        self.validate_cache_name()?;
        self.validate_origin()?;

        if self.fallback_document.is_empty() {
            bail!("fallback_document must not be empty");
        }
        if !self.precache.iter().any(|p| p == &self.fallback_document) {
            bail!(
                "fallback_document {} is not in the precache manifest, so it could never be served offline",
                self.fallback_document
            );
        }

        for path in &self.precache {
            if path.is_empty() {
                bail!("precache manifest contains an empty path");
            }
        }

        let pattern_lists = [
            ("entry_documents", &self.entry_documents),
            ("api_prefixes", &self.api_prefixes),
            ("media_hosts", &self.media_hosts),
            ("cdn_hosts", &self.cdn_hosts),
        ];
        for (name, patterns) in pattern_lists {
            if patterns.iter().any(String::is_empty) {
                bail!("{} contains an empty pattern, which would match every URL", name);
            }
        }

        Ok(())
    }

    fn validate_cache_name(&self) -> Result<()> {
        let Some((name, version)) = self.cache_name.split_once('@') else {
            bail!(
                "cache_name {:?} must have the form name@version",
                self.cache_name
            );
        };
        if name.is_empty() || version.is_empty() || version.contains('@') {
            bail!(
                "cache_name {:?} must have the form name@version",
                self.cache_name
            );
        }

        let ok = self
            .cache_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || CACHE_NAME_EXTRA_CHARS.contains(&c));
        if !ok {
            bail!(
                "cache_name {:?} contains characters outside [A-Za-z0-9@._-]",
                self.cache_name
            );
        }
        Ok(())
    }

    fn validate_origin(&self) -> Result<()> {
        let url = Url::parse(&self.origin)
            .with_context(|| format!("origin {:?} is not a valid URL", self.origin))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            bail!("origin {:?} must use http or https", self.origin);
        }
        if url.host_str().is_none() {
            bail!("origin {:?} has no host", self.origin);
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            bail!(
                "origin {:?} must be a bare origin with no path, query, or fragment",
                self.origin
            );
        }
        Ok(())
    }
}
