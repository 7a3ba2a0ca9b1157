//! Voice assistant connection gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   Device ──ws──▶ http::server ──▶ gateway::Gateway ──▶ ConnectionHandler
//!                     │ (health,        │  identity → auth → registry
//!                     │  connection cap)│
//!                     ▼                 ▼
//!                 admin API ──▶ reload::ReconfigController ◀── watcher / SIGHUP
//!                                  │ ArcSwap<ServerSnapshot>
//!                                  ▼
//!                     config + auth policy + modules
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use voice_gateway::admin::serve_admin;
use voice_gateway::config::load_config;
use voice_gateway::config::watcher::ConfigWatcher;
use voice_gateway::gateway::IdleSessionHandler;
use voice_gateway::http::HttpServer;
use voice_gateway::lifecycle::{self, signals, Runtime, StartupError};
use voice_gateway::modules::ProviderInitializer;
use voice_gateway::net::tls::load_tls_config;
use voice_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "voice-gateway", version, about = "Voice assistant connection gateway")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let local = load_config(&args.config)?;
    logging::init_logging(&local.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?args.config, "voice-gateway starting");

    let config = lifecycle::resolve_initial_config(local).await?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        auth_enabled = config.auth.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let source = lifecycle::select_source(&config, &args.config);
    let Runtime {
        gateway,
        reload_tx,
        reload_rx,
        shutdown,
    } = lifecycle::assemble(
        config.clone(),
        source,
        Arc::new(ProviderInitializer),
        Arc::new(IdleSessionHandler::boxed),
    )
    .await?;

    signals::spawn_signal_handler(shutdown.clone(), reload_tx.clone()).map_err(StartupError::Signals)?;

    // Dropping the watcher stops it, so it lives until main returns.
    let _watcher = if config.lifecycle.watch_config && !config.manager_api.is_enabled() {
        match ConfigWatcher::new(&args.config, reload_tx.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Config watcher unavailable, hot reload via file disabled");
                None
            }
        }
    } else {
        None
    };

    if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        let admin_shutdown = shutdown.subscribe();
        let admin_gateway = gateway.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(listener, admin_gateway, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let server = HttpServer::new(gateway);
    match &config.listener.tls {
        Some(tls) => {
            let tls_config = load_tls_config(tls).await.map_err(StartupError::Tls)?;
            let addr: SocketAddr = config.listener.bind_address.parse().map_err(|e| StartupError::Bind {
                address: config.listener.bind_address.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            })?;
            server.run_tls(addr, tls_config, reload_rx, shutdown.subscribe()).await?;
        }
        None => {
            let listener = bind(&config.listener.bind_address).await?;
            server.run(listener, reload_rx, shutdown.subscribe()).await?;
        }
    }

    // Stops the admin API if the listener ended on its own.
    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
