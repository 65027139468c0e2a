use std::fmt;

use thiserror::Error;

/// Errors surfaced while executing a request.
///
/// A response that arrives with an error status (404, 500, ...) is not an
/// error here. Like a browser `fetch`, request execution only fails when no
/// response could be produced at all: DNS failure, refused connection, a
/// request that could never be sent.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Invalid request for {url}: {reason}")]
    InvalidRequest { url: String, reason: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        FetchError::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_request(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        FetchError::InvalidRequest {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// The request URL the failure belongs to.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Network { url, .. } => url,
            FetchError::InvalidRequest { url, .. } => url,
        }
    }
}
