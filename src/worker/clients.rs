//! Client messaging.
//!
//! Workers push lifecycle notifications to the pages they control and
//! receive commands back. `ClientRegistry` is the outbound seam; inbound
//! commands arrive as `MessageEvent`s and parse into `WorkerCommand`.
//!
//! Message shapes are part of the wire contract with the page. With the
//! `ts` feature enabled, TypeScript definitions are generated for them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Notification pushed to every connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum WorkerMessage {
    /// A new worker version has started installing.
    #[serde(rename = "SW_INSTALLING")]
    Installing { version: String },
    /// A worker version has taken over and started activation.
    #[serde(rename = "SW_ACTIVATED")]
    Activated { version: String },
}

/// Command sent by a client page to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum WorkerCommand {
    /// Ask a waiting worker to activate now instead of waiting for old
    /// instances to wind down.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
}

/// Capability to reach the client pages a worker controls.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Deliver a message to every connected client. Best effort and
    /// fire-and-forget; clients that miss one can query state later.
    async fn broadcast(&self, message: &WorkerMessage);

    /// Take control of all in-scope clients immediately instead of
    /// waiting for their next load.
    async fn claim(&self);
}

/// Registry for hosts with no client plumbing attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClients;

#[async_trait]
impl ClientRegistry for NullClients {
    async fn broadcast(&self, message: &WorkerMessage) {
        trace!(message = ?message, "dropping broadcast, no clients connected");
    }

    async fn claim(&self) {
        trace!("claim requested with no clients connected");
    }
}
