//! Transport seam between the gateway and a concrete streaming socket.

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;

use crate::observability::metrics;

/// Application data carried by a streaming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("close failed: {0}")]
    Close(String),
}

/// A bidirectional, message-oriented connection.
#[async_trait]
pub trait Transport: Send {
    /// Next inbound frame; `None` once the peer has closed.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Close the connection. May fail if the peer already went away.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Close if not already closed; failures are logged and counted, never returned.
pub async fn close_quietly(transport: &mut dyn Transport) {
    if let Err(e) = transport.close().await {
        metrics::record_close_error();
        tracing::warn!(error = %e, "Error while closing transport");
    }
}
