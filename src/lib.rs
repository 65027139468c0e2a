//! Offline-first request routing and versioned response caching for
//! app-shell web clients.
//!
//! The crate decides, request by request, how a client app's traffic is
//! served: navigations and entry documents go network-first so users get
//! the newest shell whenever they are online, API and presigned-media
//! traffic passes straight through, and everything else is cache-first,
//! populated as the app is used.
//!
//! Cached responses live in namespaces named `name@version`. Shipping a
//! new version installs into a fresh namespace and, on activation, sweeps
//! every older one, so stale shells disappear in one step.
//!
//! `Worker` ties it together and is driven by the host environment
//! through install / activate / fetch / message events. The capability
//! traits (`CacheStore`, `Network`, `ClientRegistry`) keep storage,
//! transport, and client messaging swappable; `MemoryStore`, `DiskStore`,
//! and `HttpFetcher` are the shipped implementations.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod worker;

pub use cache::{CacheHandle, CacheKey, CacheStore, DiskStore, MemoryStore};
pub use config::WorkerConfig;
pub use fetch::{
    resolve_url, CachedResponse, Destination, FetchError, FetchRequest, HttpFetcher, Mode,
    Network, Origin, ResponseKind,
};
pub use worker::{
    classify, ClientRegistry, FetchEvent, MessageEvent, NullClients, Strategy, Worker,
    WorkerCommand, WorkerMessage, WorkerState,
};
