//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the initial configuration (local file, then manager API if configured)
//! - Pick the config source used by later reconfigurations
//! - Build the first snapshot, the registry and the gateway
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners are bound by the caller, after the gateway exists

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::schema::GatewayConfig;
use crate::config::source::{ConfigSource, FileConfigSource, HttpConfigSource, SourceError};
use crate::config::ConfigError;
use crate::gateway::{Gateway, HandlerFactory};
use crate::lifecycle::Shutdown;
use crate::modules::ModuleInitializer;
use crate::net::connection::ConnectionRegistry;
use crate::reload::plan::retain_restart_only;
use crate::reload::{ReconfigController, ReconfigurationError, ReloadTrigger};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("initial configuration unavailable: {0}")]
    Source(#[from] SourceError),

    #[error("failed to build initial snapshot: {0}")]
    Bootstrap(#[from] ReconfigurationError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(std::io::Error),

    #[error("signal handler setup failed: {0}")]
    Signals(std::io::Error),
}

/// Everything the binary wires together after startup.
pub struct Runtime {
    pub gateway: Arc<Gateway>,
    pub reload_tx: mpsc::UnboundedSender<ReloadTrigger>,
    pub reload_rx: mpsc::UnboundedReceiver<ReloadTrigger>,
    pub shutdown: Arc<Shutdown>,
}

/// Source consulted on every reconfiguration.
///
/// The manager API wins when configured; otherwise the config file is re-read.
pub fn select_source(config: &GatewayConfig, config_path: &Path) -> Arc<dyn ConfigSource> {
    if config.manager_api.is_enabled() {
        tracing::info!(url = %config.manager_api.url, "Using manager API as config source");
        Arc::new(HttpConfigSource::new())
    } else {
        tracing::info!(path = ?config_path, "Using config file as config source");
        Arc::new(FileConfigSource::new(config_path))
    }
}

/// Replace the local config with the manager API's, when one is configured.
///
/// Listener and manager API settings always come from the local file.
pub async fn resolve_initial_config(local: GatewayConfig) -> Result<GatewayConfig, StartupError> {
    if !local.manager_api.is_enabled() {
        return Ok(local);
    }
    let mut remote = HttpConfigSource::new().fetch(&local).await?;
    retain_restart_only(&local, &mut remote);
    tracing::info!("Loaded configuration from manager API");
    Ok(remote)
}

/// Build the initial snapshot and the gateway around it.
pub async fn assemble(
    config: GatewayConfig,
    source: Arc<dyn ConfigSource>,
    initializer: Arc<dyn ModuleInitializer>,
    factory: Arc<dyn HandlerFactory>,
) -> Result<Runtime, StartupError> {
    let controller = Arc::new(ReconfigController::bootstrap(config, source, initializer).await?);
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();
    let shutdown = Arc::new(Shutdown::new());

    let gateway = Arc::new(Gateway::new(
        controller,
        ConnectionRegistry::new(),
        factory,
        reload_tx.clone(),
        shutdown.clone(),
    ));

    Ok(Runtime {
        gateway,
        reload_tx,
        reload_rx,
        shutdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::IdleSessionHandler;
    use crate::modules::ProviderInitializer;

    #[tokio::test]
    async fn assembles_generation_one() {
        let runtime = assemble(
            GatewayConfig::default(),
            Arc::new(FileConfigSource::new("gateway.toml")),
            Arc::new(ProviderInitializer),
            Arc::new(IdleSessionHandler::boxed),
        )
        .await
        .unwrap();

        assert_eq!(runtime.gateway.controller().current().generation, 1);
        assert!(runtime.gateway.registry().is_empty());
        assert!(runtime.gateway.server().request_reload(ReloadTrigger::Handler));
    }

    #[tokio::test]
    async fn invalid_config_fails_startup() {
        let mut config = GatewayConfig::default();
        config.listener.max_connections = 0;

        let result = assemble(
            config,
            Arc::new(FileConfigSource::new("gateway.toml")),
            Arc::new(ProviderInitializer),
            Arc::new(IdleSessionHandler::boxed),
        )
        .await;

        assert!(matches!(result, Err(StartupError::Bootstrap(ReconfigurationError::Invalid(_)))));
    }

    #[tokio::test]
    async fn local_config_used_without_manager_api() {
        let config = GatewayConfig::default();
        let resolved = resolve_initial_config(config.clone()).await.unwrap();
        assert_eq!(resolved, config);
    }
}
