//! Request execution: typed requests, buffered responses, and the
//! network seam.
//!
//! This module provides:
//! - `FetchRequest` / `CachedResponse`: the request and response shapes
//!   the routing layer works with
//! - `Network`: the capability trait requests are executed through
//! - `HttpFetcher`: the reqwest-backed `Network` implementation

pub mod error;
pub mod network;
pub mod request;
pub mod response;

pub use error::FetchError;
pub use network::{HttpFetcher, Mode, Network};
pub use request::{resolve_url, Destination, FetchRequest, Origin};
pub use response::{CachedResponse, ResponseKind};
