//! Connection gateway: the per-connection accept path.
//!
//! # Data Flow
//! ```text
//! upgraded transport + HandshakeRequest
//!     → identity::normalize           (Accepted → Identified)
//!         fail: diagnostic message, close
//!     → AuthManager::verify            (Identified → Authenticated)
//!         fail: authentication-failure message, close
//!     → current snapshot → HandlerFactory::create → registry   (→ Handling)
//!     → handler.run() in its own task
//!     → deregister, close_quietly      (→ Closed)
//! ```
//!
//! # Design Decisions
//! - Nothing stateful is built until authentication has finished
//! - Auth policy and modules come from the same snapshot
//! - Handler errors and panics end one connection, never the listener
//! - Cleanup runs on every exit path

pub mod handler;
pub mod session;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderMap, Uri};
use tokio::sync::mpsc;

use crate::auth::{AuthManager, AuthOutcome, AuthRejection};
use crate::identity;
use crate::lifecycle::Shutdown;
use crate::net::connection::{ConnectionId, ConnectionInfo, ConnectionRegistry};
use crate::observability::metrics;
use crate::reload::{ReconfigController, ReloadTrigger};

pub use crate::net::connection::ConnectionState;
pub use handler::{ConnectionHandler, HandlerContext, HandlerError, HandlerFactory, ServerHandle};
pub use session::IdleSessionHandler;
pub use transport::{close_quietly, Frame, Transport, TransportError};

/// Sent when no device id could be resolved.
pub const DIAGNOSTIC_MESSAGE: &str =
    "Server port is working. To test a connection, use test_page.html";

/// Sent when authentication refuses the connection.
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";

/// Handshake data captured before the upgrade.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    pub headers: HeaderMap,
    /// Path and query of the upgrade request.
    pub target: Uri,
    pub peer_addr: Option<SocketAddr>,
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    IdentityRejected,
    AuthRejected(AuthRejection),
    /// The auth policy could not be evaluated.
    InternalError,
    Completed(ConnectionId),
    HandlerFailed(ConnectionId),
}

/// Orchestrates the accept path for streaming connections.
pub struct Gateway {
    controller: Arc<ReconfigController>,
    registry: ConnectionRegistry,
    factory: Arc<dyn HandlerFactory>,
    server: ServerHandle,
}

impl Gateway {
    pub fn new(
        controller: Arc<ReconfigController>,
        registry: ConnectionRegistry,
        factory: Arc<dyn HandlerFactory>,
        reload_tx: mpsc::UnboundedSender<ReloadTrigger>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let server = ServerHandle::new(controller.clone(), registry.clone(), reload_tx, shutdown);
        Self {
            controller,
            registry,
            factory,
            server,
        }
    }

    pub fn controller(&self) -> &Arc<ReconfigController> {
        &self.controller
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn server(&self) -> &ServerHandle {
        &self.server
    }

    /// Drive one upgraded transport from accept to close.
    pub async fn serve_connection(
        &self,
        mut transport: Box<dyn Transport>,
        request: HandshakeRequest,
    ) -> ConnectionOutcome {
        let peer = request.peer_addr;
        let mut state = ConnectionState::Accepted;

        let identity = match identity::normalize(&request.headers, &request.target) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::info!(peer = ?peer, error = %e, "No device id, sending diagnostic");
                metrics::record_handshake("missing_identity");
                reject(&mut *transport, DIAGNOSTIC_MESSAGE).await;
                transition(&mut state, ConnectionState::Closed, None);
                return ConnectionOutcome::IdentityRejected;
            }
        };
        transition(&mut state, ConnectionState::Identified, None);

        let snapshot = self.controller.current();
        let outcome = match AuthManager.verify(&identity, &snapshot.auth) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(device_id = %identity.device_id(), error = %e, "Auth policy unusable");
                metrics::record_handshake("auth_error");
                close_quietly(&mut *transport).await;
                transition(&mut state, ConnectionState::Closed, None);
                return ConnectionOutcome::InternalError;
            }
        };
        metrics::record_handshake(outcome.as_str());
        if let AuthOutcome::Rejected(reason) = outcome {
            tracing::warn!(
                device_id = %identity.device_id(),
                client_id = ?identity.client_id(),
                reason = %reason,
                "Authentication failed"
            );
            reject(&mut *transport, AUTH_FAILED_MESSAGE).await;
            transition(&mut state, ConnectionState::Closed, None);
            return ConnectionOutcome::AuthRejected(reason);
        }
        transition(&mut state, ConnectionState::Authenticated, None);

        let id = ConnectionId::new();
        let mut handler = self.factory.create(HandlerContext {
            id,
            identity: identity.clone(),
            generation: snapshot.generation,
            config: snapshot.config.clone(),
            modules: snapshot.modules.clone(),
            server: self.server.clone(),
        });
        let guard = self.registry.register(ConnectionInfo::new(
            id,
            identity.device_id(),
            identity.client_id().map(str::to_owned),
            peer,
            snapshot.generation,
        ));
        drop(snapshot);
        transition(&mut state, ConnectionState::Handling, Some(id));
        tracing::info!(
            connection_id = %id,
            device_id = %identity.device_id(),
            auth = outcome.as_str(),
            "Connection established"
        );

        let started = Instant::now();
        let joined = tokio::spawn(async move {
            let result = handler.run(&mut *transport).await;
            (transport, result)
        })
        .await;

        let (transport, result) = match joined {
            Ok((transport, result)) => (Some(transport), result),
            // The transport was dropped while unwinding, which closes it.
            Err(e) => (None, Err(HandlerError::Panicked(e.to_string()))),
        };

        guard.release();
        if let Some(mut transport) = transport {
            close_quietly(&mut *transport).await;
        }
        transition(&mut state, ConnectionState::Closed, Some(id));

        match result {
            Ok(()) => {
                metrics::record_connection_closed("completed", started);
                tracing::info!(connection_id = %id, "Connection closed");
                ConnectionOutcome::Completed(id)
            }
            Err(e) => {
                metrics::record_connection_closed("failed", started);
                tracing::error!(connection_id = %id, error = %e, "Error while handling connection");
                ConnectionOutcome::HandlerFailed(id)
            }
        }
    }
}

/// Send a refusal message, then close.
async fn reject(transport: &mut dyn Transport, message: &str) {
    if let Err(e) = transport.send(Frame::Text(message.to_string())).await {
        tracing::debug!(error = %e, "Could not deliver rejection message");
    }
    close_quietly(transport).await;
}

fn transition(state: &mut ConnectionState, next: ConnectionState, id: Option<ConnectionId>) {
    tracing::trace!(connection_id = ?id, from = ?*state, to = ?next, "Connection state");
    *state = next;
}
