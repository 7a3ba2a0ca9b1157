//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or manager API (JSON)
//!     → loader.rs / source.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → committed into a ServerSnapshot by the reload controller
//!
//! On reload trigger (file change, SIGHUP, admin API, handler request):
//!     watcher.rs / signals / admin send a ReloadTrigger
//!     → reload controller fetches through a ConfigSource
//!     → validation.rs validates
//!     → atomic swap of Arc<ServerSnapshot>
//!     → new connections observe the new config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full replace
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener and manager API settings only change on restart

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, GatewayConfig, ListenerConfig, ManagerApiConfig, ProviderConfig,
    SelectedModules,
};
pub use source::{ConfigSource, FileConfigSource, HttpConfigSource, SourceError};
