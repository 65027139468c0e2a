//! Versioned response caching.
//!
//! Responses are stored under namespaces named `name@version`. Exactly
//! one namespace is current for a given deployment; the rest are swept
//! when a new worker activates.
//!
//! Two `CacheStore` implementations ship:
//! - `MemoryStore`: in-process, for tests and embedded hosts
//! - `DiskStore`: one directory per namespace under a cache root

pub mod disk;
pub mod memory;
pub mod store;

pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use store::{CacheHandle, CacheKey, CacheStore};
