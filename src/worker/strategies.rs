//! Strategy execution.
//!
//! `router::classify` decides how a request is handled; this module does
//! the handling. Cache trouble never fails a request here: a broken store
//! degrades to network-only behavior, and a dead network falls back to
//! whatever the cache still holds.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheHandle, CacheKey};
use crate::fetch::{
    resolve_url, CachedResponse, Destination, FetchError, FetchRequest, Mode, Origin,
};

use super::router;
use super::Worker;

impl Worker {
    /// Network first. The fresh response, whatever its status, refreshes
    /// the cache and goes back to the page. With the network down: the
    /// cached copy, then the fallback document, then the error.
    pub(crate) async fn run_navigate(
        &self,
        request: &FetchRequest,
    ) -> Result<CachedResponse, FetchError> {
        let key = CacheKey::from_request(request);
        match self.network.fetch(request, Mode::Cors).await {
            Ok(response) => {
                self.store_snapshot(&key, &response).await;
                Ok(response)
            }
            Err(error) => {
                debug!(url = %request.url, error = %error, "navigation fetch failed, trying cache");
                if let Some(hit) = self.lookup_cached(&key).await {
                    return Ok(hit);
                }
                if let Some(shell) = self.fallback_document().await {
                    debug!(url = %request.url, "serving fallback document");
                    return Ok(shell);
                }
                Err(error)
            }
        }
    }

    /// Network first for documents that must never be stale while online.
    /// Unlike navigation there is no fallback-document step: offline with
    /// no cached copy means the request fails.
    pub(crate) async fn run_always_fresh(
        &self,
        request: &FetchRequest,
    ) -> Result<CachedResponse, FetchError> {
        let key = CacheKey::from_request(request);
        match self.network.fetch(request, Mode::Cors).await {
            Ok(response) => {
                self.store_snapshot(&key, &response).await;
                Ok(response)
            }
            Err(error) => {
                debug!(url = %request.url, error = %error, "fresh fetch failed, trying cache");
                match self.lookup_cached(&key).await {
                    Some(hit) => Ok(hit),
                    None => Err(error),
                }
            }
        }
    }

    /// Straight passthrough. No cache read, no cache write, no fallback.
    pub(crate) async fn run_bypass(
        &self,
        request: &FetchRequest,
    ) -> Result<CachedResponse, FetchError> {
        self.network.fetch(request, Mode::Cors).await
    }

    /// Cached copy first, network on miss, then the post-fetch caching
    /// rules decide whether the fresh response is kept.
    pub(crate) async fn run_cache_first(
        &self,
        request: &FetchRequest,
    ) -> Result<CachedResponse, FetchError> {
        let key = CacheKey::from_request(request);
        if let Some(hit) = self.lookup_cached(&key).await {
            debug!(key = %key, "serving cached response");
            return Ok(hit);
        }

        // Without CORS approval, cross-origin resources can only be
        // fetched opaquely.
        let mode = match request.origin {
            Origin::SameOrigin => Mode::Cors,
            Origin::CrossOrigin => Mode::NoCors,
        };

        match self.network.fetch(request, mode).await {
            Ok(response) => {
                self.maybe_cache(&key, request, &response).await;
                Ok(response)
            }
            Err(error) => self.cache_first_fallback(request, error).await,
        }
    }

    /// Post-fetch caching rules for cache-first traffic.
    async fn maybe_cache(&self, key: &CacheKey, request: &FetchRequest, response: &CachedResponse) {
        if response.status != 200 {
            // Opaque responses land here too, their status reads as 0.
            // Caching one requires the explicit opt-in and a trusted host.
            let trusted_opaque = self.config.cache_opaque_from_cdn
                && response.is_opaque()
                && router::matches_cdn(&request.url, &self.config);
            if trusted_opaque {
                self.store_snapshot(key, response).await;
            } else {
                debug!(url = %request.url, status = response.status, "not caching non-200 response");
            }
            return;
        }

        let worth_caching = router::matches_cdn(&request.url, &self.config)
            || matches!(
                request.destination,
                Destination::Image | Destination::Font | Destination::Style | Destination::Script
            );
        if worth_caching {
            self.store_snapshot(key, response).await;
        } else {
            debug!(url = %request.url, destination = %request.destination, "not caching");
        }
    }

    /// Offline endgame for cache-first traffic: an empty 404 for images,
    /// the cached shell for documents, the error for everything else.
    async fn cache_first_fallback(
        &self,
        request: &FetchRequest,
        error: FetchError,
    ) -> Result<CachedResponse, FetchError> {
        match request.destination {
            Destination::Image => {
                debug!(url = %request.url, "image fetch failed, serving empty 404");
                Ok(CachedResponse::placeholder_not_found(&request.url))
            }
            Destination::Document => {
                if let Some(shell) = self.fallback_document().await {
                    debug!(url = %request.url, "document fetch failed, serving fallback document");
                    return Ok(shell);
                }
                Err(error)
            }
            _ => Err(error),
        }
    }

    // ===== Cache access =====
    // Failures below are logged and absorbed. A request must never fail
    // because the cache does.

    async fn open_cache(&self) -> Option<Arc<dyn CacheHandle>> {
        match self.store.open(&self.config.cache_name).await {
            Ok(cache) => Some(cache),
            Err(error) => {
                warn!(namespace = %self.config.cache_name, error = %error, "cache store unavailable");
                None
            }
        }
    }

    pub(crate) async fn lookup_cached(&self, key: &CacheKey) -> Option<CachedResponse> {
        let cache = self.open_cache().await?;
        match cache.lookup(key).await {
            Ok(hit) => hit,
            Err(error) => {
                warn!(key = %key, error = %error, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    pub(crate) async fn store_snapshot(&self, key: &CacheKey, response: &CachedResponse) {
        let Some(cache) = self.open_cache().await else {
            return;
        };
        if let Err(error) = cache.put(key, response.snapshot()).await {
            warn!(key = %key, error = %error, "failed to cache response");
        } else {
            debug!(key = %key, "cached response");
        }
    }

    /// The precached shell document, if it is still in the cache.
    async fn fallback_document(&self) -> Option<CachedResponse> {
        let url = resolve_url(&self.config.origin, &self.config.fallback_document).ok()?;
        self.lookup_cached(&CacheKey::get(url)).await
    }
}
