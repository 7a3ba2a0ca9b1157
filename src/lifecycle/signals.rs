//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second SIGTERM/SIGINT forces exit without draining
//! - SIGHUP triggers config reload, not shutdown

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::reload::ReloadTrigger;

/// Spawn the signal listener task.
#[cfg(unix)]
pub fn spawn_signal_handler(
    shutdown: Arc<Shutdown>,
    reload_tx: mpsc::UnboundedSender<ReloadTrigger>,
) -> Result<JoinHandle<()>, std::io::Error> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        let mut stopping = false;
        loop {
            let name = tokio::select! {
                _ = terminate.recv() => "SIGTERM",
                _ = interrupt.recv() => "SIGINT",
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP received, requesting reload");
                    let _ = reload_tx.send(ReloadTrigger::Signal);
                    continue;
                }
            };

            if stopping {
                tracing::warn!(signal = name, "Second stop signal, exiting immediately");
                std::process::exit(1);
            }
            stopping = true;
            tracing::info!(signal = name, "Stop signal received, shutting down");
            shutdown.trigger();
        }
    }))
}

/// Spawn the signal listener task.
#[cfg(not(unix))]
pub fn spawn_signal_handler(
    shutdown: Arc<Shutdown>,
    _reload_tx: mpsc::UnboundedSender<ReloadTrigger>,
) -> Result<JoinHandle<()>, std::io::Error> {
    Ok(tokio::spawn(async move {
        let mut stopping = false;
        while tokio::signal::ctrl_c().await.is_ok() {
            if stopping {
                tracing::warn!("Second Ctrl+C, exiting immediately");
                std::process::exit(1);
            }
            stopping = true;
            tracing::info!("Ctrl+C received, shutting down");
            shutdown.trigger();
        }
    }))
}
