//! Response snapshots.
//!
//! A `CachedResponse` is a fully buffered response: status, headers, body.
//! Unlike a streaming body it can be duplicated freely, which is what lets
//! one copy go to the requester while another goes into the cache.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How much of a response the worker is allowed to see.
///
/// `Opaque` marks a cross-origin response fetched without CORS approval:
/// the body may be stored and replayed, but status and headers are
/// deliberately withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Basic,
    Cors,
    Opaque,
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseKind::Basic => write!(f, "basic"),
            ResponseKind::Cors => write!(f, "cors"),
            ResponseKind::Opaque => write!(f, "opaque"),
        }
    }
}

/// A buffered response, fit for returning to a requester or storing.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// Final URL the response was produced for, after any redirects.
    pub url: String,
    /// HTTP status. Always 0 for opaque responses.
    pub status: u16,
    pub kind: ResponseKind,
    /// Header names are stored lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            kind: ResponseKind::Basic,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// A 200 response, the common case in tests and pre-warming.
    pub fn ok(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(url, 200, body)
    }

    /// The empty 404 served when an image cannot be fetched and has no
    /// cached copy. Pages render their own broken-image treatment; an
    /// empty 404 is enough to resolve the request.
    pub fn placeholder_not_found(url: impl Into<String>) -> Self {
        Self::new(url, 404, Bytes::new())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// Degrade to an opaque response: status reads as 0 and headers are
    /// dropped, but the body is kept so it can still be replayed.
    pub fn into_opaque(mut self) -> Self {
        self.status = 0;
        self.headers.clear();
        self.kind = ResponseKind::Opaque;
        self
    }

    /// Duplicate the response so one copy can be stored while the other is
    /// returned to the requester. Snapshots share no mutable state.
    pub fn snapshot(&self) -> CachedResponse {
        self.clone()
    }

    pub fn is_opaque(&self) -> bool {
        self.kind == ResponseKind::Opaque
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}
