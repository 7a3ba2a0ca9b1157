//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake)
//!     → HTTP layer (upgrade or health)
//!     → connection.rs (registry entry while a handler runs)
//!
//! Connection States:
//!     Accepted → Identified → Authenticated → Handling → Closed
//! ```
//!
//! # Design Decisions
//! - The connection cap is checked against the registry before accept
//! - Each live connection is tracked for graceful shutdown
//! - TLS is optional and handled transparently

pub mod connection;
pub mod tls;
