//! Built-in handler used when no processing pipeline is plugged in.
//!
//! It answers a `{"type":"hello"}` text frame with the session id and the
//! modules the connection is pinned to, ignores other frames, and ends the
//! connection on idle timeout, peer close or server shutdown.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::gateway::handler::{ConnectionHandler, HandlerContext, HandlerError};
use crate::gateway::transport::{Frame, Transport};

#[derive(Debug, Deserialize)]
struct InboundMessage {
    #[serde(rename = "type")]
    kind: String,
}

pub struct IdleSessionHandler {
    context: HandlerContext,
    session_id: Uuid,
    idle_timeout: Duration,
}

impl IdleSessionHandler {
    pub fn new(context: HandlerContext) -> Self {
        let idle_timeout = Duration::from_secs(context.config.session.idle_timeout_secs);
        Self {
            context,
            session_id: Uuid::new_v4(),
            idle_timeout,
        }
    }

    /// Factory function for [`crate::gateway::Gateway`].
    pub fn boxed(context: HandlerContext) -> Box<dyn ConnectionHandler> {
        Box::new(Self::new(context))
    }

    fn hello(&self) -> Frame {
        Frame::Text(
            json!({
                "type": "hello",
                "session_id": self.session_id,
                "device_id": self.context.identity.device_id(),
                "generation": self.context.generation,
                "modules": self.context.modules.describe(),
            })
            .to_string(),
        )
    }

    async fn on_text(&mut self, transport: &mut dyn Transport, text: &str) -> Result<(), HandlerError> {
        match serde_json::from_str::<InboundMessage>(text) {
            Ok(msg) if msg.kind == "hello" => transport.send(self.hello()).await?,
            Ok(msg) => tracing::debug!(connection_id = %self.context.id, kind = %msg.kind, "Ignoring message"),
            Err(e) => {
                return Err(HandlerError::Protocol(format!("malformed text frame: {e}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectionHandler for IdleSessionHandler {
    async fn run(&mut self, transport: &mut dyn Transport) -> Result<(), HandlerError> {
        let mut shutdown = self.context.server.subscribe_shutdown();
        tracing::info!(
            connection_id = %self.context.id,
            session_id = %self.session_id,
            device_id = %self.context.identity.device_id(),
            "Session started"
        );

        loop {
            tokio::select! {
                next = tokio::time::timeout(self.idle_timeout, transport.recv()) => {
                    match next {
                        Err(_) => {
                            tracing::info!(connection_id = %self.context.id, "Session idle, closing");
                            return Ok(());
                        }
                        Ok(None) => return Ok(()),
                        Ok(Some(Err(e))) => return Err(e.into()),
                        Ok(Some(Ok(Frame::Text(text)))) => self.on_text(transport, &text).await?,
                        Ok(Some(Ok(Frame::Binary(_)))) => {}
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(connection_id = %self.context.id, "Server shutting down, ending session");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfigSource, GatewayConfig};
    use crate::gateway::TransportError;
    use crate::identity::IdentityRecord;
    use crate::modules::ProviderInitializer;
    use crate::net::connection::ConnectionId;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Yields the queued frames, then waits forever like an idle device.
    struct IdleTransport {
        inbound: VecDeque<Frame>,
        sent: Vec<Frame>,
    }

    #[async_trait]
    impl Transport for IdleTransport {
        async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
            match self.inbound.pop_front() {
                Some(frame) => Some(Ok(frame)),
                None => std::future::pending().await,
            }
        }

        async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
            self.sent.push(frame);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    async fn context() -> HandlerContext {
        let runtime = crate::lifecycle::assemble(
            GatewayConfig::default(),
            Arc::new(FileConfigSource::new("gateway.toml")),
            Arc::new(ProviderInitializer),
            Arc::new(IdleSessionHandler::boxed),
        )
        .await
        .unwrap();
        let snapshot = runtime.gateway.controller().current();
        HandlerContext {
            id: ConnectionId::new(),
            identity: IdentityRecord::new("dev-1", None, None).unwrap(),
            generation: snapshot.generation,
            config: snapshot.config.clone(),
            modules: snapshot.modules.clone(),
            server: runtime.gateway.server().clone(),
        }
    }

    #[tokio::test]
    async fn session_started_after_shutdown_ends_immediately() {
        let context = context().await;
        context.server.shutdown().trigger();

        let mut transport = IdleTransport {
            inbound: VecDeque::new(),
            sent: Vec::new(),
        };
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            IdleSessionHandler::new(context).run(&mut transport),
        )
        .await
        .expect("session must observe an earlier shutdown");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn hello_is_answered_then_shutdown_ends_session() {
        let context = context().await;
        let server = context.server.clone();
        let mut transport = IdleTransport {
            inbound: VecDeque::from([Frame::Text(r#"{"type":"hello"}"#.into())]),
            sent: Vec::new(),
        };

        let mut handler = IdleSessionHandler::new(context);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            server.shutdown().trigger();
        });
        handler.run(&mut transport).await.unwrap();
        stopper.await.unwrap();

        let Frame::Text(reply) = &transport.sent[0] else {
            panic!("expected a text reply");
        };
        let reply: serde_json::Value = serde_json::from_str(reply).unwrap();
        assert_eq!(reply["type"], "hello");
        assert_eq!(reply["device_id"], "dev-1");
        assert_eq!(reply["generation"], 1);
    }

    #[tokio::test]
    async fn malformed_text_is_a_protocol_error() {
        let context = context().await;
        let mut transport = IdleTransport {
            inbound: VecDeque::from([Frame::Text("not json".into())]),
            sent: Vec::new(),
        };
        let result = IdleSessionHandler::new(context).run(&mut transport).await;
        assert!(matches!(result, Err(HandlerError::Protocol(_))));
    }
}
