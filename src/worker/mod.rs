//! The worker: lifecycle, routing entry point, and state.
//!
//! A `Worker` owns a validated configuration and three capabilities: a
//! cache store, a network, and a client registry. The host environment
//! drives it through four entry points:
//! - `handle_install`, once when this version first loads
//! - `handle_activate`, when this version takes over
//! - `handle_fetch`, once per intercepted request
//! - `handle_message`, for commands sent by client pages
//!
//! Entry points are independent async operations and may interleave; the
//! worker itself holds no per-request state.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::cache::{CacheKey, CacheStore};
use crate::config::WorkerConfig;
use crate::fetch::{resolve_url, CachedResponse, FetchError, FetchRequest, Mode, Network};

pub mod clients;
pub mod router;
mod strategies;
#[cfg(test)]
pub(crate) mod testutil;

pub use clients::{ClientRegistry, NullClients, WorkerCommand, WorkerMessage};
pub use router::{classify, Strategy};

/// How many precache fetches run at once during installation.
/// Keeps installs quick without stampeding the origin on first load.
const MAX_CONCURRENT_PREWARM: usize = 10;

/// Lifecycle states, in the order a version moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    New,
    Installing,
    /// Installed and waiting to take over from the previous version.
    Installed,
    Activating,
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::New => "new",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
        };
        write!(f, "{}", name)
    }
}

/// An intercepted request, as delivered by the host environment.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    pub request: FetchRequest,
}

impl FetchEvent {
    pub fn new(request: FetchRequest) -> Self {
        Self { request }
    }
}

/// A message posted by a client page.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub data: Value,
}

impl MessageEvent {
    pub fn new(data: Value) -> Self {
        Self { data }
    }
}

pub struct Worker {
    config: WorkerConfig,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    clients: Arc<dyn ClientRegistry>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Worker {
    /// Build a worker over the given capabilities. The configuration is
    /// validated here, once; nothing downstream re-checks it.
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        clients: Arc<dyn ClientRegistry>,
    ) -> Result<Self> {
        config.validate().context("invalid worker configuration")?;
        Ok(Self {
            config,
            store,
            network,
            clients,
            state: Mutex::new(WorkerState::New),
            skip_waiting: AtomicBool::new(false),
        })
    }

    /// The versioned cache name this worker serves.
    pub fn version(&self) -> &str {
        &self.config.cache_name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        info!(from = %*state, to = %next, "worker state change");
        *state = next;
    }

    /// True once something has asked this version to activate without
    /// waiting for old instances. The host checks this after install and
    /// after each handled message.
    pub fn activation_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    fn request_activation(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    /// Install this version: announce it, pre-warm the shell, signal
    /// readiness to activate.
    ///
    /// A failed pre-warm is logged and absorbed. The version still
    /// installs and still requests activation; runtime caching backfills
    /// whatever the shell cache is missing.
    pub async fn handle_install(&self) {
        self.set_state(WorkerState::Installing);
        info!(version = %self.config.cache_name, "installing");
        self.clients
            .broadcast(&WorkerMessage::Installing {
                version: self.config.cache_name.clone(),
            })
            .await;

        if let Err(e) = self.prewarm().await {
            error!(error = %e, "pre-warm failed, continuing without full shell cache");
        }

        self.request_activation();
        self.set_state(WorkerState::Installed);
    }

    /// Fetch the whole precache manifest and store it, all or nothing:
    /// one failed or non-200 fetch abandons the batch, so a version never
    /// installs with a partial shell.
    async fn prewarm(&self) -> Result<()> {
        if self.config.precache.is_empty() {
            return Ok(());
        }

        let cache = self
            .store
            .open(&self.config.cache_name)
            .await
            .context("opening cache namespace for pre-warm")?;

        let urls = self
            .config
            .precache
            .iter()
            .map(|path| resolve_url(&self.config.origin, path))
            .collect::<Result<Vec<_>, _>>()
            .context("resolving precache manifest")?;

        let total = urls.len();
        let results = stream::iter(urls)
            .map(|url| {
                let network = Arc::clone(&self.network);
                async move {
                    let request = FetchRequest::get(&url);
                    let response = network.fetch(&request, Mode::Cors).await?;
                    if response.status != 200 {
                        bail!(
                            "precache fetch for {} returned status {}",
                            url,
                            response.status
                        );
                    }
                    anyhow::Ok((CacheKey::get(&url), response))
                }
            })
            .buffer_unordered(MAX_CONCURRENT_PREWARM)
            .collect::<Vec<_>>()
            .await;

        let mut entries = Vec::with_capacity(total);
        for result in results {
            entries.push(result?);
        }

        // Nothing is written until every fetch has succeeded.
        for (key, response) in entries {
            cache
                .put(&key, response)
                .await
                .with_context(|| format!("storing precached {}", key))?;
        }

        info!(count = total, namespace = %self.config.cache_name, "pre-warm complete");
        Ok(())
    }

    /// Activate this version: announce it, sweep every stale namespace,
    /// and claim all open pages. Safe to call again; a second activation
    /// finds nothing to sweep.
    pub async fn handle_activate(&self) -> Result<()> {
        self.set_state(WorkerState::Activating);
        info!(version = %self.config.cache_name, "activating");
        self.clients
            .broadcast(&WorkerMessage::Activated {
                version: self.config.cache_name.clone(),
            })
            .await;

        self.sweep_stale_namespaces().await?;
        self.clients.claim().await;

        self.set_state(WorkerState::Activated);
        Ok(())
    }

    /// Delete every namespace that is not the current one. Entries the
    /// new version wrote during install survive untouched.
    async fn sweep_stale_namespaces(&self) -> Result<()> {
        let names = self
            .store
            .namespaces()
            .await
            .context("enumerating cache namespaces")?;
        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| name != &self.config.cache_name)
            .collect();
        if stale.is_empty() {
            debug!("no stale cache namespaces");
            return Ok(());
        }

        let deletions = stale.iter().map(|name| {
            let store = Arc::clone(&self.store);
            async move {
                info!(namespace = %name, "deleting stale cache namespace");
                store
                    .remove(name)
                    .await
                    .with_context(|| format!("deleting stale namespace {}", name))
            }
        });

        for result in join_all(deletions).await {
            result?;
        }
        Ok(())
    }

    /// Handle a command from a client page. Unrecognized payloads are
    /// logged and dropped.
    pub fn handle_message(&self, event: MessageEvent) {
        match serde_json::from_value::<WorkerCommand>(event.data) {
            Ok(WorkerCommand::SkipWaiting) => {
                info!("client requested immediate activation");
                self.request_activation();
            }
            Err(error) => {
                debug!(error = %error, "ignoring unrecognized client message");
            }
        }
    }

    /// Route one intercepted request. Every request resolves with exactly
    /// one response or error; cache maintenance never changes the outcome.
    pub async fn handle_fetch(&self, event: FetchEvent) -> Result<CachedResponse, FetchError> {
        let request = &event.request;
        let strategy = router::classify(request, &self.config);
        debug!(
            url = %request.url,
            strategy = %strategy,
            destination = %request.destination,
            "routing request"
        );

        match strategy {
            Strategy::Navigate => self.run_navigate(request).await,
            Strategy::AlwaysFresh => self.run_always_fresh(request).await,
            Strategy::Bypass => self.run_bypass(request).await,
            Strategy::CacheFirst => self.run_cache_first(request).await,
        }
    }
}
