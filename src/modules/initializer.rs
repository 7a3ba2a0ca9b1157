//! Module initialization.
//!
//! The real VAD/ASR/LLM/memory/intent implementations live outside the
//! gateway. `ModuleInitializer` is the seam through which they are built;
//! `ProviderInitializer` is the built-in implementation that resolves the
//! selected providers from configuration into descriptor modules.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::modules::{Module, ModuleKind, ModuleMap};

/// Which capabilities the configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub vad: bool,
    pub asr: bool,
    pub llm: bool,
    pub memory: bool,
    pub intent: bool,
}

impl Capabilities {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let selected = &config.selected_module;
        Self {
            vad: selected.get(ModuleKind::Vad).is_some(),
            asr: selected.get(ModuleKind::Asr).is_some(),
            llm: selected.get(ModuleKind::Llm).is_some(),
            memory: selected.get(ModuleKind::Memory).is_some(),
            intent: selected.get(ModuleKind::Intent).is_some(),
        }
    }

    pub fn contains(&self, kind: ModuleKind) -> bool {
        match kind {
            ModuleKind::Vad => self.vad,
            ModuleKind::Asr => self.asr,
            ModuleKind::Llm => self.llm,
            ModuleKind::Memory => self.memory,
            ModuleKind::Intent => self.intent,
        }
    }
}

/// Whether VAD and ASR should be rebuilt this round.
///
/// Other capabilities are rebuilt whenever they are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildFlags {
    pub vad: bool,
    pub asr: bool,
}

impl RebuildFlags {
    pub const ALL: RebuildFlags = RebuildFlags { vad: true, asr: true };

    /// Final decision for one capability given what is selected.
    pub fn should_build(&self, kind: ModuleKind, selected: Capabilities) -> bool {
        let rebuild = match kind {
            ModuleKind::Vad => self.vad,
            ModuleKind::Asr => self.asr,
            ModuleKind::Llm | ModuleKind::Memory | ModuleKind::Intent => true,
        };
        rebuild && selected.contains(kind)
    }
}

#[derive(Debug, Error)]
pub enum ModuleInitError {
    #[error("{kind} provider {name:?} is not configured")]
    MissingProvider { kind: ModuleKind, name: String },

    #[error("failed to initialize {kind} provider {name:?}: {reason}")]
    Failed {
        kind: ModuleKind,
        name: String,
        reason: String,
    },
}

/// Builds module handles for a configuration.
#[async_trait]
pub trait ModuleInitializer: Send + Sync {
    /// Build the selected modules, honouring the VAD/ASR rebuild flags.
    ///
    /// The returned map holds only what was built; absent entries are either
    /// not selected or not rebuilt.
    async fn initialize(
        &self,
        config: &GatewayConfig,
        selected: Capabilities,
        rebuild: RebuildFlags,
    ) -> Result<ModuleMap, ModuleInitError>;
}

/// A configured provider, described by name, type and settings.
#[derive(Debug, Clone)]
pub struct ProviderModule {
    kind: ModuleKind,
    name: String,
    provider_type: String,
    settings: Map<String, Value>,
}

impl ProviderModule {
    pub fn new(
        kind: ModuleKind,
        name: impl Into<String>,
        provider_type: impl Into<String>,
        settings: Map<String, Value>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            provider_type: provider_type.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }
}

impl Module for ProviderModule {
    fn kind(&self) -> ModuleKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> &str {
        &self.provider_type
    }
}

/// Resolves the selected provider entries from the configuration.
#[derive(Debug, Clone, Default)]
pub struct ProviderInitializer;

#[async_trait]
impl ModuleInitializer for ProviderInitializer {
    async fn initialize(
        &self,
        config: &GatewayConfig,
        selected: Capabilities,
        rebuild: RebuildFlags,
    ) -> Result<ModuleMap, ModuleInitError> {
        let mut built = ModuleMap::new();

        for kind in ModuleKind::ALL {
            if !rebuild.should_build(kind, selected) {
                continue;
            }
            let Some(name) = config.selected_module.get(kind) else {
                continue;
            };
            let entry = config
                .providers(kind)
                .get(name)
                .ok_or_else(|| ModuleInitError::MissingProvider {
                    kind,
                    name: name.to_string(),
                })?;
            let provider_type = entry.provider_type.as_deref().unwrap_or(name).trim();
            if provider_type.is_empty() {
                return Err(ModuleInitError::Failed {
                    kind,
                    name: name.to_string(),
                    reason: "provider type is blank".to_string(),
                });
            }

            tracing::info!(module = %kind, name, provider_type, "Module initialized");
            built.insert(
                kind,
                Arc::new(ProviderModule::new(
                    kind,
                    name,
                    provider_type,
                    entry.settings.clone(),
                )),
            );
        }

        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProviderConfig;

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.selected_module.vad = Some("SileroVAD".into());
        config.selected_module.asr = Some("FunASR".into());
        config.selected_module.llm = Some("ChatGLMLLM".into());
        config.vad.insert(
            "SileroVAD".into(),
            ProviderConfig {
                provider_type: Some("silero".into()),
                ..Default::default()
            },
        );
        config.asr.insert("FunASR".into(), ProviderConfig::default());
        config.llm.insert("ChatGLMLLM".into(), ProviderConfig::default());
        config
    }

    #[tokio::test]
    async fn builds_selected_modules() {
        let config = config();
        let built = ProviderInitializer
            .initialize(&config, Capabilities::from_config(&config), RebuildFlags::ALL)
            .await
            .unwrap();

        assert_eq!(built.len(), 3);
        assert_eq!(built[&ModuleKind::Vad].provider_type(), "silero");
        assert_eq!(built[&ModuleKind::Asr].provider_type(), "FunASR");
        assert!(!built.contains_key(&ModuleKind::Memory));
    }

    #[tokio::test]
    async fn skips_vad_and_asr_without_rebuild_flags() {
        let config = config();
        let built = ProviderInitializer
            .initialize(
                &config,
                Capabilities::from_config(&config),
                RebuildFlags { vad: false, asr: false },
            )
            .await
            .unwrap();

        let kinds: Vec<_> = built.keys().copied().collect();
        assert_eq!(kinds, vec![ModuleKind::Llm]);
    }

    #[tokio::test]
    async fn missing_provider_entry_fails() {
        let mut config = config();
        config.llm.clear();
        let err = ProviderInitializer
            .initialize(&config, Capabilities::from_config(&config), RebuildFlags::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleInitError::MissingProvider { kind: ModuleKind::Llm, .. }));
    }

    #[tokio::test]
    async fn blank_provider_type_fails() {
        let mut config = config();
        config.vad.get_mut("SileroVAD").unwrap().provider_type = Some("  ".into());
        let err = ProviderInitializer
            .initialize(&config, Capabilities::from_config(&config), RebuildFlags::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleInitError::Failed { kind: ModuleKind::Vad, .. }));
        assert!(err.to_string().contains("blank"));
    }
}
