//! Owner of the current server snapshot and its atomic replacement.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::auth::AuthPolicy;
use crate::config::schema::GatewayConfig;
use crate::config::source::{ConfigSource, SourceError};
use crate::config::validation::{describe_errors, validate_config, ValidationError};
use crate::modules::{
    Capabilities, ModuleDescription, ModuleInitError, ModuleInitializer, ModuleKind, ModuleSet,
    RebuildFlags,
};
use crate::observability::metrics;
use crate::reload::plan::{retain_restart_only, RebuildPlan, RestartOnly};

/// Everything a new connection needs, committed as one unit.
#[derive(Debug)]
pub struct ServerSnapshot {
    /// Increments on every committed replace; 1 at startup.
    pub generation: u64,
    pub config: Arc<GatewayConfig>,
    pub modules: ModuleSet,
    pub auth: Arc<AuthPolicy>,
}

#[derive(Debug, Error)]
pub enum ReconfigurationError {
    #[error("configuration source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("new configuration is invalid: {}", describe_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("module initialization failed: {0}")]
    ModuleInit(#[from] ModuleInitError),
}

/// Summary of a committed replace.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub generation: u64,
    /// Capabilities that received a new module handle.
    pub rebuilt: Vec<ModuleKind>,
    pub restart_only: RestartOnly,
    pub modules: Vec<ModuleDescription>,
}

/// Serializes replacements and publishes snapshots to readers.
pub struct ReconfigController {
    current: ArcSwap<ServerSnapshot>,
    replace_lock: Mutex<()>,
    source: Arc<dyn ConfigSource>,
    initializer: Arc<dyn ModuleInitializer>,
}

impl std::fmt::Debug for ReconfigController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconfigController")
            .field("generation", &self.current.load().generation)
            .finish_non_exhaustive()
    }
}

impl ReconfigController {
    /// Build the first snapshot with every selected module initialized.
    pub async fn bootstrap(
        config: GatewayConfig,
        source: Arc<dyn ConfigSource>,
        initializer: Arc<dyn ModuleInitializer>,
    ) -> Result<Self, ReconfigurationError> {
        validate_config(&config).map_err(ReconfigurationError::Invalid)?;

        let built = initializer
            .initialize(&config, Capabilities::from_config(&config), RebuildFlags::ALL)
            .await?;
        let snapshot = ServerSnapshot {
            generation: 1,
            auth: Arc::new(AuthPolicy::from_config(&config.auth)),
            config: Arc::new(config),
            modules: ModuleSet::from_map(built),
        };
        tracing::info!(modules = ?snapshot.modules.describe(), "Initial modules ready");

        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            replace_lock: Mutex::new(()),
            source,
            initializer,
        })
    }

    /// The latest committed snapshot. Never blocks.
    pub fn current(&self) -> Arc<ServerSnapshot> {
        self.current.load_full()
    }

    /// Fetch, rebuild and commit a new snapshot.
    ///
    /// Calls are processed one at a time. On error nothing is committed and
    /// the previous snapshot stays current.
    pub async fn replace(&self) -> Result<ReloadReport, ReconfigurationError> {
        let result = self.replace_locked().await;
        match &result {
            Ok(report) => {
                metrics::record_reload("success");
                tracing::info!(
                    generation = report.generation,
                    rebuilt = ?report.rebuilt,
                    "Configuration replaced"
                );
            }
            Err(e) => {
                metrics::record_reload("failure");
                tracing::error!(error = %e, "Configuration replace failed, keeping current snapshot");
            }
        }
        result
    }

    async fn replace_locked(&self) -> Result<ReloadReport, ReconfigurationError> {
        let _exclusive = self.replace_lock.lock().await;
        // Only this section stores, so `old` stays current until the commit below.
        let old = self.current.load_full();

        let mut new_config = self.source.fetch(&old.config).await?;
        tracing::info!("Fetched new configuration");
        validate_config(&new_config).map_err(ReconfigurationError::Invalid)?;

        let restart_only = retain_restart_only(&old.config, &mut new_config);
        if restart_only.any() {
            tracing::warn!(
                listener_changed = restart_only.listener_changed,
                manager_api_changed = restart_only.manager_api_changed,
                "Ignoring settings that require a restart"
            );
        }

        let plan = RebuildPlan::between(&old.config, &new_config);
        tracing::info!(rebuild_vad = plan.rebuild.vad, rebuild_asr = plan.rebuild.asr, "Rebuild plan");

        let built = self
            .initializer
            .initialize(&new_config, plan.selected, plan.rebuild)
            .await?;

        let mut rebuilt: Vec<_> = built.keys().copied().collect();
        rebuilt.sort_by_key(|k| ModuleKind::ALL.iter().position(|a| a == k));

        let snapshot = ServerSnapshot {
            generation: old.generation + 1,
            auth: Arc::new(AuthPolicy::from_config(&new_config.auth)),
            config: Arc::new(new_config),
            modules: old.modules.merge(built),
        };
        let report = ReloadReport {
            generation: snapshot.generation,
            rebuilt,
            restart_only,
            modules: snapshot.modules.describe(),
        };

        self.current.store(Arc::new(snapshot));
        Ok(report)
    }
}
