//! Structured logging.
//!
//! `RUST_LOG` overrides the configured level when set.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `level` is either a bare level (`info`) applied to this crate and
/// tower-http, or a full filter directive.
pub fn init_logging(level: &str) {
    let default_directive = if level.contains('=') {
        level.to_string()
    } else {
        format!("voice_gateway={level},tower_http={level}")
    };

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
