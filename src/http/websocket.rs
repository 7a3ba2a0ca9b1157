//! WebSocket transport.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests before accept
//! - Adapt an upgraded axum `WebSocket` to the gateway's [`Transport`]
//!
//! # Design Decisions
//! - Ping/pong is answered by the socket layer and never surfaces as a frame
//! - A peer close frame ends the stream and marks the transport closed
//! - `close()` is idempotent; once closed by either side it is a no-op

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::http::{header, HeaderMap};

use crate::gateway::{Frame, Transport, TransportError};

/// Whether a request asks for a WebSocket upgrade.
///
/// `Connection` must list `upgrade` and `Upgrade` must be `websocket`,
/// both case-insensitive.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"));

    connection_upgrade && upgrade_websocket
}

/// What one inbound WebSocket message means to the gateway.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Frame(Frame),
    Control,
    Closed,
}

fn classify(message: Message) -> Inbound {
    match message {
        Message::Text(text) => Inbound::Frame(Frame::Text(text.as_str().to_owned())),
        Message::Binary(data) => Inbound::Frame(Frame::Binary(data)),
        Message::Ping(_) | Message::Pong(_) => Inbound::Control,
        Message::Close(_) => Inbound::Closed,
    }
}

/// [`Transport`] over an upgraded WebSocket.
pub struct WsTransport {
    socket: WebSocket,
    closed: bool,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        if self.closed {
            return None;
        }
        loop {
            let Some(next) = self.socket.recv().await else {
                self.closed = true;
                return None;
            };
            match next.map(classify) {
                Ok(Inbound::Frame(frame)) => return Some(Ok(frame)),
                Ok(Inbound::Control) => continue,
                Ok(Inbound::Closed) => {
                    // The socket layer already answered the peer's close frame.
                    self.closed = true;
                    return None;
                }
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data),
        };
        self.socket
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.socket
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(k.clone(), HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn detects_upgrade_case_insensitively() {
        let h = headers(&[
            (header::CONNECTION, "keep-alive, Upgrade"),
            (header::UPGRADE, "WebSocket"),
        ]);
        assert!(is_upgrade_request(&h));
    }

    #[test]
    fn plain_get_is_not_an_upgrade() {
        assert!(!is_upgrade_request(&HeaderMap::new()));
        let h = headers(&[(header::CONNECTION, "keep-alive")]);
        assert!(!is_upgrade_request(&h));
    }

    #[test]
    fn peer_close_frame_ends_the_stream() {
        assert_eq!(classify(Message::Close(None)), Inbound::Closed);
        assert_eq!(classify(Message::Ping(Default::default())), Inbound::Control);
        assert_eq!(
            classify(Message::Text("hi".into())),
            Inbound::Frame(Frame::Text("hi".into()))
        );
    }

    #[test]
    fn requires_both_headers() {
        let only_upgrade = headers(&[(header::UPGRADE, "websocket")]);
        assert!(!is_upgrade_request(&only_upgrade));

        let wrong_protocol = headers(&[(header::CONNECTION, "upgrade"), (header::UPGRADE, "h2c")]);
        assert!(!is_upgrade_request(&wrong_protocol));
    }
}
