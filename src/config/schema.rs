//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits so the same schema is read from TOML files
//! on disk and from JSON documents served by the manager API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::modules::ModuleKind;

/// Root configuration for the voice gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS, connection cap).
    pub listener: ListenerConfig,

    /// Device authentication policy.
    pub auth: AuthConfig,

    /// Provider selected for each processing capability.
    pub selected_module: SelectedModules,

    /// Voice-activity-detection providers by name.
    #[serde(rename = "VAD", alias = "vad")]
    pub vad: BTreeMap<String, ProviderConfig>,

    /// Speech-recognition providers by name.
    #[serde(rename = "ASR", alias = "asr")]
    pub asr: BTreeMap<String, ProviderConfig>,

    /// Language-model providers by name.
    #[serde(rename = "LLM", alias = "llm")]
    pub llm: BTreeMap<String, ProviderConfig>,

    /// Memory providers by name.
    #[serde(rename = "Memory", alias = "memory")]
    pub memory: BTreeMap<String, ProviderConfig>,

    /// Intent providers by name.
    #[serde(rename = "Intent", alias = "intent")]
    pub intent: BTreeMap<String, ProviderConfig>,

    /// Per-session settings consumed by the built-in handler.
    pub session: SessionConfig,

    /// Remote configuration source.
    pub manager_api: ManagerApiConfig,

    /// Startup and shutdown behaviour.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl GatewayConfig {
    /// Provider table for one capability.
    pub fn providers(&self, kind: ModuleKind) -> &BTreeMap<String, ProviderConfig> {
        match kind {
            ModuleKind::Vad => &self.vad,
            ModuleKind::Asr => &self.asr,
            ModuleKind::Llm => &self.llm,
            ModuleKind::Memory => &self.memory,
            ModuleKind::Intent => &self.intent,
        }
    }

    /// Resolve the provider type of the selected module for `kind`.
    ///
    /// An entry without an explicit `type` uses its own name as its type.
    pub fn selected_provider_type(&self, kind: ModuleKind) -> Option<String> {
        let name = self.selected_module.get(kind)?;
        let provider_type = self
            .providers(kind)
            .get(name)
            .and_then(|p| p.provider_type.clone())
            .unwrap_or_else(|| name.to_string());
        Some(provider_type)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent streaming connections.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Device authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Require authentication for streaming connections.
    pub enabled: bool,

    /// Devices admitted without a token.
    pub allowed_devices: Vec<String>,

    /// Shared secret used to sign bearer tokens.
    pub auth_key: String,

    /// Token lifetime in seconds.
    pub expire_seconds: Option<u64>,
}

/// Provider name selected per capability. `None` leaves it unselected.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct SelectedModules {
    #[serde(rename = "VAD", alias = "vad")]
    pub vad: Option<String>,
    #[serde(rename = "ASR", alias = "asr")]
    pub asr: Option<String>,
    #[serde(rename = "LLM", alias = "llm")]
    pub llm: Option<String>,
    #[serde(rename = "Memory", alias = "memory")]
    pub memory: Option<String>,
    #[serde(rename = "Intent", alias = "intent")]
    pub intent: Option<String>,
}

impl SelectedModules {
    pub fn get(&self, kind: ModuleKind) -> Option<&str> {
        let selected = match kind {
            ModuleKind::Vad => &self.vad,
            ModuleKind::Asr => &self.asr,
            ModuleKind::Llm => &self.llm,
            ModuleKind::Memory => &self.memory,
            ModuleKind::Intent => &self.intent,
        };
        selected.as_deref().filter(|name| !name.is_empty())
    }
}

/// One provider entry, e.g. `[ASR.FunASR]`.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ProviderConfig {
    /// Implementation type; defaults to the entry name.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,

    /// Remaining provider-specific settings, passed through untouched.
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// Session settings for the built-in handler.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Close a connection after this many seconds without inbound frames.
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 120,
        }
    }
}

/// Remote configuration source (manager API).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ManagerApiConfig {
    /// Endpoint returning the full configuration as JSON. Empty disables it.
    pub url: String,

    /// Bearer secret sent to the manager API.
    pub secret: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Attempts per fetch before the source is reported unavailable.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ManagerApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            secret: String::new(),
            timeout_secs: 10,
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

impl ManagerApiConfig {
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Startup and shutdown settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Seconds to wait for live connections to finish on shutdown.
    pub drain_timeout_secs: u64,

    /// Watch the config file and reload on change.
    pub watch_config: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
            watch_config: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder key rejected by validation when the admin API is enabled.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [listener]
        bind_address = "127.0.0.1:8000"

        [auth]
        enabled = true
        allowed_devices = ["dev-1"]
        auth_key = "secret"

        [selected_module]
        VAD = "SileroVAD"
        ASR = "FunASR"

        [VAD.SileroVAD]
        type = "silero"
        threshold = 0.5

        [ASR.FunASR]
        model_dir = "models/SenseVoiceSmall"
    "#;

    #[test]
    fn parses_provider_tables() {
        let config: GatewayConfig = toml::from_str(SAMPLE).unwrap();
        assert!(config.auth.enabled);
        assert_eq!(config.selected_module.get(ModuleKind::Vad), Some("SileroVAD"));
        assert_eq!(config.selected_module.get(ModuleKind::Llm), None);

        let vad = &config.vad["SileroVAD"];
        assert_eq!(vad.provider_type.as_deref(), Some("silero"));
        assert_eq!(vad.settings["threshold"], serde_json::json!(0.5));
    }

    #[test]
    fn provider_type_falls_back_to_entry_name() {
        let config: GatewayConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(
            config.selected_provider_type(ModuleKind::Vad).as_deref(),
            Some("silero")
        );
        assert_eq!(
            config.selected_provider_type(ModuleKind::Asr).as_deref(),
            Some("FunASR")
        );
        assert_eq!(config.selected_provider_type(ModuleKind::Intent), None);
    }

    #[test]
    fn json_and_toml_share_schema() {
        let from_toml: GatewayConfig = toml::from_str(SAMPLE).unwrap();
        let json = serde_json::to_string(&from_toml).unwrap();
        let from_json: GatewayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(from_toml, from_json);
    }
}
