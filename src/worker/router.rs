//! Request classification.
//!
//! Every intercepted request maps to exactly one strategy. Precedence is
//! fixed: navigations win, then the always-fresh document list, then the
//! bypass lists, and cache-first takes everything that remains.

use std::fmt;

use crate::config::WorkerConfig;
use crate::fetch::FetchRequest;

/// The four ways a request can be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Network first, cached copy second, fallback document last.
    Navigate,
    /// Network first with the cache as offline fallback only, for
    /// documents that must not be served stale while online.
    AlwaysFresh,
    /// Straight to the network. The cache never sees these requests.
    Bypass,
    /// Cached copy first, network on miss.
    CacheFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Navigate => write!(f, "navigate"),
            Strategy::AlwaysFresh => write!(f, "always-fresh"),
            Strategy::Bypass => write!(f, "bypass"),
            Strategy::CacheFirst => write!(f, "cache-first"),
        }
    }
}

/// True when any pattern occurs as a substring of the URL. Empty patterns
/// never match anything.
fn matches_any(url: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && url.contains(pattern.as_str()))
}

/// True when the URL belongs to one of the configured content CDNs.
pub(crate) fn matches_cdn(url: &str, config: &WorkerConfig) -> bool {
    matches_any(url, &config.cdn_hosts)
}

/// Decide how a request is handled. Pure: the same request and config
/// always map to the same strategy.
pub fn classify(request: &FetchRequest, config: &WorkerConfig) -> Strategy {
    if request.navigate {
        return Strategy::Navigate;
    }
    if matches_any(&request.url, &config.entry_documents) {
        return Strategy::AlwaysFresh;
    }
    if matches_any(&request.url, &config.api_prefixes)
        || matches_any(&request.url, &config.media_hosts)
    {
        return Strategy::Bypass;
    }
    Strategy::CacheFirst
}
