//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Manager API (optional) → Bootstrap snapshot → Gateway
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Notify handlers → Drain registry → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then modules, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Drain has a timeout: exit after the deadline even with live connections

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{assemble, resolve_initial_config, select_source, Runtime, StartupError};
