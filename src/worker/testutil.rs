//! Scripted fakes for exercising routing and lifecycle logic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::cache::{CacheHandle, CacheKey, CacheStore, MemoryStore};
use crate::config::WorkerConfig;
use crate::fetch::{CachedResponse, FetchError, FetchRequest, Mode, Network, Origin};

use super::clients::{ClientRegistry, WorkerMessage};
use super::Worker;

/// Config shared by worker tests: one entry document, one API prefix,
/// one media host, one CDN host.
pub(crate) fn test_config() -> WorkerConfig {
    WorkerConfig {
        cache_name: "shell@1.0.0".to_string(),
        origin: "https://app.example.com".to_string(),
        precache: vec![
            "/static/app.html".to_string(),
            "/static/styles.css".to_string(),
            "/static/logo.png".to_string(),
        ],
        entry_documents: vec!["/static/app.html".to_string()],
        fallback_document: "/static/app.html".to_string(),
        api_prefixes: vec!["/api/".to_string()],
        media_hosts: vec!["prod-media.s3.".to_string()],
        cdn_hosts: vec!["cdn.assets.example".to_string()],
        cache_opaque_from_cdn: false,
    }
}

/// Absolute URL on the test origin.
pub(crate) fn url(path: &str) -> String {
    format!("https://app.example.com{}", path)
}

enum Script {
    Respond(CachedResponse),
    Fail(String),
}

/// `Network` fake that answers from a routing table and records traffic.
/// Unrouted URLs fail like an unreachable host, so "go offline" is just
/// not routing (or re-routing) a URL.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, Script>>,
    hits: Mutex<HashMap<String, usize>>,
    modes: Mutex<HashMap<String, Mode>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: CachedResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Respond(response));
    }

    pub fn fail(&self, url: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Fail("connection refused".to_string()));
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }

    pub fn mode_used(&self, url: &str) -> Option<Mode> {
        self.modes.lock().unwrap().get(url).copied()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &FetchRequest, mode: Mode) -> Result<CachedResponse, FetchError> {
        *self
            .hits
            .lock()
            .unwrap()
            .entry(request.url.clone())
            .or_insert(0) += 1;
        self.modes.lock().unwrap().insert(request.url.clone(), mode);

        let routes = self.routes.lock().unwrap();
        match routes.get(&request.url) {
            Some(Script::Respond(response)) => {
                let response = response.snapshot();
                if mode == Mode::NoCors && request.origin == Origin::CrossOrigin {
                    Ok(response.into_opaque())
                } else {
                    Ok(response)
                }
            }
            Some(Script::Fail(reason)) => Err(FetchError::network(&request.url, reason)),
            None => Err(FetchError::network(&request.url, "no route to host")),
        }
    }
}

/// Wraps a `MemoryStore` and counts the lookups and puts that reach it.
#[derive(Default)]
pub(crate) struct CountingStore {
    inner: MemoryStore,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

struct CountingHandle {
    inner: Arc<dyn CacheHandle>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn open(&self, namespace: &str) -> Result<Arc<dyn CacheHandle>> {
        let inner = self.inner.open(namespace).await?;
        Ok(Arc::new(CountingHandle {
            inner,
            reads: Arc::clone(&self.reads),
            writes: Arc::clone(&self.writes),
        }))
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        self.inner.namespaces().await
    }

    async fn remove(&self, namespace: &str) -> Result<bool> {
        self.inner.remove(namespace).await
    }
}

#[async_trait]
impl CacheHandle for CountingHandle {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(key).await
    }

    async fn put(&self, key: &CacheKey, snapshot: CachedResponse) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, snapshot).await
    }
}

/// `ClientRegistry` that records everything it is asked to send.
#[derive(Default)]
pub(crate) struct RecordingClients {
    messages: Mutex<Vec<WorkerMessage>>,
    claims: AtomicUsize,
}

impl RecordingClients {
    pub fn messages(&self) -> Vec<WorkerMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn claims(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientRegistry for RecordingClients {
    async fn broadcast(&self, message: &WorkerMessage) {
        self.messages.lock().unwrap().push(message.clone());
    }

    async fn claim(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }
}

/// A worker wired to fakes, with the fakes kept reachable for assertions.
pub(crate) struct TestHost {
    pub worker: Worker,
    pub network: Arc<FakeNetwork>,
    pub store: MemoryStore,
    pub clients: Arc<RecordingClients>,
}

pub(crate) fn host() -> TestHost {
    host_with_config(test_config())
}

pub(crate) fn host_with_config(config: WorkerConfig) -> TestHost {
    host_over(MemoryStore::new(), config)
}

/// Build a worker over an existing store, so several worker versions can
/// share one store across a test.
pub(crate) fn host_over(store: MemoryStore, config: WorkerConfig) -> TestHost {
    let network = Arc::new(FakeNetwork::new());
    let clients = Arc::new(RecordingClients::default());
    let worker = Worker::new(
        config,
        Arc::new(store.clone()),
        Arc::clone(&network) as Arc<dyn Network>,
        Arc::clone(&clients) as Arc<dyn ClientRegistry>,
    )
    .unwrap();

    TestHost {
        worker,
        network,
        store,
        clients,
    }
}

/// Put an entry into the worker's current namespace directly, simulating
/// state left behind by earlier traffic or a previous session.
pub(crate) async fn seed(store: &MemoryStore, namespace: &str, url: &str, body: &str) {
    let cache = store.open(namespace).await.unwrap();
    cache
        .put(&CacheKey::get(url), CachedResponse::ok(url, body.to_string()))
        .await
        .unwrap();
}
