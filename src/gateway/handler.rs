//! Per-connection handler seam.
//!
//! The processing pipeline is external: the gateway only constructs a
//! handler from a [`HandlerContext`] and runs it to completion.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::schema::GatewayConfig;
use crate::gateway::transport::{Transport, TransportError};
use crate::identity::IdentityRecord;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::modules::ModuleSet;
use crate::net::connection::{ConnectionId, ConnectionRegistry};
use crate::reload::{ReconfigController, ReloadTrigger, ServerSnapshot};

/// Abnormal end of a handler's processing loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

/// Server-wide facilities a handler may use.
#[derive(Clone)]
pub struct ServerHandle {
    controller: Arc<ReconfigController>,
    registry: ConnectionRegistry,
    reload_tx: mpsc::UnboundedSender<ReloadTrigger>,
    shutdown: Arc<Shutdown>,
}

impl ServerHandle {
    pub fn new(
        controller: Arc<ReconfigController>,
        registry: ConnectionRegistry,
        reload_tx: mpsc::UnboundedSender<ReloadTrigger>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self {
            controller,
            registry,
            reload_tx,
            shutdown,
        }
    }

    /// Latest committed snapshot (not necessarily the one this connection is pinned to).
    pub fn current(&self) -> Arc<ServerSnapshot> {
        self.controller.current()
    }

    pub fn controller(&self) -> &Arc<ReconfigController> {
        &self.controller
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Ask the server loop to run a reconfiguration. Returns `false` if it has stopped.
    pub fn request_reload(&self, trigger: ReloadTrigger) -> bool {
        self.reload_tx.send(trigger).is_ok()
    }

    pub fn subscribe_shutdown(&self) -> ShutdownSignal {
        self.shutdown.subscribe()
    }

    pub fn shutdown(&self) -> &Arc<Shutdown> {
        &self.shutdown
    }
}

/// Everything a handler is constructed with.
///
/// `config` and `modules` are pinned to the snapshot current at construction.
#[derive(Clone)]
pub struct HandlerContext {
    pub id: ConnectionId,
    pub identity: IdentityRecord,
    pub generation: u64,
    pub config: Arc<GatewayConfig>,
    pub modules: ModuleSet,
    pub server: ServerHandle,
}

/// Runs one connection to completion.
#[async_trait]
pub trait ConnectionHandler: Send {
    async fn run(&mut self, transport: &mut dyn Transport) -> Result<(), HandlerError>;
}

/// Builds a handler for each authenticated connection.
pub trait HandlerFactory: Send + Sync {
    fn create(&self, context: HandlerContext) -> Box<dyn ConnectionHandler>;
}

impl<F> HandlerFactory for F
where
    F: Fn(HandlerContext) -> Box<dyn ConnectionHandler> + Send + Sync,
{
    fn create(&self, context: HandlerContext) -> Box<dyn ConnectionHandler> {
        self(context)
    }
}
