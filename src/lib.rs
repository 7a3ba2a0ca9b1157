//! Voice assistant connection gateway library.
//!
//! Accepts device streaming connections, identifies and authenticates them,
//! hands each one to a per-connection handler pinned to a consistent set of
//! processing modules, and swaps configuration and modules at runtime.

pub mod admin;
pub mod auth;
pub mod config;
pub mod gateway;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod modules;
pub mod net;
pub mod observability;
pub mod reload;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use gateway::Gateway;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
