//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request id, tracing)
//!     → websocket.rs (upgrade detection)
//!         not an upgrade → health response
//!         over capacity  → 503
//!         upgrade        → WsTransport → gateway::Gateway::serve_connection
//! ```

pub mod server;
pub mod websocket;

pub use server::{apply_reload, health_response, AppState, HttpServer, HEALTH_BODY};
pub use websocket::{is_upgrade_request, WsTransport};
