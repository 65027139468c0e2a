//! Typed requests as seen by the routing layer.
//!
//! A `FetchRequest` carries the handful of request attributes the router
//! actually branches on: the URL, whether the request is a navigation,
//! what kind of resource the page asked for, and which side of the origin
//! boundary it falls on.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;
use url::Url;

use super::FetchError;

/// The resource kind the requesting page intends to load.
///
/// Mirrors the request destinations that matter for caching decisions;
/// everything else collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Font,
    Style,
    Script,
    Other,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Destination::Document => "document",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Style => "style",
            Destination::Script => "script",
            Destination::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Which side of the origin boundary a request falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    SameOrigin,
    CrossOrigin,
}

impl Origin {
    /// Classify a request URL against the origin the worker is serving.
    ///
    /// Anything that cannot be parsed is treated as cross-origin, which
    /// keeps unparseable URLs out of the credentialed request path.
    pub fn classify(request_url: &str, worker_origin: &str) -> Self {
        match (Url::parse(request_url), Url::parse(worker_origin)) {
            (Ok(request), Ok(worker)) if request.origin() == worker.origin() => {
                Origin::SameOrigin
            }
            _ => {
                trace!(url = request_url, "classified as cross-origin");
                Origin::CrossOrigin
            }
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::SameOrigin => write!(f, "same-origin"),
            Origin::CrossOrigin => write!(f, "cross-origin"),
        }
    }
}

/// A single intercepted request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
    /// True for top-level navigations (address bar, link clicks, reloads).
    pub navigate: bool,
    pub destination: Destination,
    pub origin: Origin,
}

impl FetchRequest {
    /// A plain same-origin GET. Use the builder methods for everything else.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            navigate: false,
            destination: Destination::Other,
            origin: Origin::SameOrigin,
        }
    }

    pub fn navigation(mut self) -> Self {
        self.navigate = true;
        self.destination = Destination::Document;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Derive the origin field by comparing the request URL to the origin
    /// the worker is serving.
    pub fn origin_against(mut self, worker_origin: &str) -> Self {
        self.origin = Origin::classify(&self.url, worker_origin);
        self
    }
}

/// Resolve a path from a precache manifest against the serving origin.
///
/// Manifests list shell assets as absolute paths (`/static/app.html`).
/// Resolving them up front means cache keys always hold the same absolute
/// URL form that intercepted requests carry.
pub fn resolve_url(origin: &str, path_or_url: &str) -> Result<String, FetchError> {
    if path_or_url.contains("://") {
        return Ok(path_or_url.to_string());
    }

    let base = Url::parse(origin)
        .map_err(|e| FetchError::invalid_request(origin, format!("bad origin: {}", e)))?;
    let resolved = base
        .join(path_or_url)
        .map_err(|e| FetchError::invalid_request(path_or_url, e))?;

    Ok(resolved.into())
}
