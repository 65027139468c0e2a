//! The network seam and its HTTP implementation.
//!
//! Routing logic talks to `Network`, never to an HTTP client directly,
//! so tests can swap in scripted fetchers and hosts can wrap transports
//! of their own.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use tracing::{debug, trace};
use url::Url;

use super::{CachedResponse, FetchError, FetchRequest, Origin, ResponseKind};

/// How a request crosses the origin boundary.
///
/// `NoCors` is the unauthenticated cross-origin mode: the request may go
/// out, but the response comes back opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Cors,
    NoCors,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Cors => write!(f, "cors"),
            Mode::NoCors => write!(f, "no-cors"),
        }
    }
}

/// Capability to execute a request against the network.
///
/// Implementations resolve with a buffered response for any HTTP status,
/// including error statuses. `Err` means no response could be produced:
/// the transport failed or the request was unsendable.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest, mode: Mode) -> Result<CachedResponse, FetchError>;
}

/// `Network` implementation over a shared HTTP client.
///
/// No request timeout is configured. Requests race the cache fallback
/// paths, and large media fetches on slow links are expected to take as
/// long as they take.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client, sharing its connection pool.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Flatten response headers, lowercasing names. Values that are not valid
/// UTF-8 are skipped rather than failing the whole response.
fn convert_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut converted = BTreeMap::new();
    for (name, value) in headers.iter() {
        match value.to_str() {
            Ok(value) => {
                converted.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
            Err(_) => {
                trace!(header = name.as_str(), "skipping non-UTF-8 header value");
            }
        }
    }
    converted
}

#[async_trait]
impl Network for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest, mode: Mode) -> Result<CachedResponse, FetchError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| FetchError::invalid_request(&request.url, e))?;
        let url = Url::parse(&request.url)
            .map_err(|e| FetchError::invalid_request(&request.url, e))?;

        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| FetchError::network(&request.url, e))?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = convert_headers(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(&request.url, e))?;

        debug!(url = %final_url, status, mode = %mode, bytes = body.len(), "fetched");

        let kind = match request.origin {
            Origin::SameOrigin => ResponseKind::Basic,
            Origin::CrossOrigin => ResponseKind::Cors,
        };
        let response = CachedResponse {
            url: final_url,
            status,
            kind,
            headers,
            body,
        };

        // Without CORS approval a cross-origin response is only usable in
        // its opaque form.
        if mode == Mode::NoCors && request.origin == Origin::CrossOrigin {
            return Ok(response.into_opaque());
        }

        Ok(response)
    }
}
