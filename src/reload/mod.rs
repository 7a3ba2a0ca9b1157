//! Live reconfiguration subsystem.
//!
//! # Data Flow
//! ```text
//! ReloadTrigger (file watcher, SIGHUP, admin API, handler request)
//!     → controller.rs replace() [exclusive]
//!         → ConfigSource::fetch
//!         → validate_config
//!         → plan.rs (VAD/ASR rebuild flags, restart-only settings)
//!         → ModuleInitializer::initialize
//!         → ModuleSet::merge + one ArcSwap store
//!     → new connections pin the new snapshot
//! ```
//!
//! # Design Decisions
//! - Mutation is the last step: every failure happens before the store
//! - Readers never wait on a replace in progress
//! - LLM, memory and intent rebuild on every replace; VAD/ASR only on type change

pub mod controller;
pub mod plan;

pub use controller::{ReconfigController, ReconfigurationError, ReloadReport, ServerSnapshot};
pub use plan::{RebuildPlan, RestartOnly};

/// Why a reconfiguration was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadTrigger {
    FileChanged,
    Signal,
    Admin,
    Handler,
}

impl ReloadTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadTrigger::FileChanged => "file_changed",
            ReloadTrigger::Signal => "signal",
            ReloadTrigger::Admin => "admin",
            ReloadTrigger::Handler => "handler",
        }
    }
}
