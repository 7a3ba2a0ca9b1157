//! What a reconfiguration needs to rebuild.

use serde::Serialize;

use crate::config::schema::GatewayConfig;
use crate::modules::{Capabilities, ModuleKind, RebuildFlags};

/// Rebuild decisions derived from an old/new configuration pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildPlan {
    pub selected: Capabilities,
    pub rebuild: RebuildFlags,
}

impl RebuildPlan {
    pub fn between(old: &GatewayConfig, new: &GatewayConfig) -> Self {
        Self {
            selected: Capabilities::from_config(new),
            rebuild: RebuildFlags {
                vad: provider_type_changed(old, new, ModuleKind::Vad),
                asr: provider_type_changed(old, new, ModuleKind::Asr),
            },
        }
    }
}

/// A VAD or ASR module is rebuilt only when the selected provider type changes.
///
/// Nothing selected in `new` means nothing to rebuild; a selection appearing
/// where there was none counts as a change.
fn provider_type_changed(old: &GatewayConfig, new: &GatewayConfig, kind: ModuleKind) -> bool {
    match new.selected_provider_type(kind) {
        None => false,
        Some(new_type) => old.selected_provider_type(kind).as_deref() != Some(new_type.as_str()),
    }
}

/// Settings that only take effect on restart and were left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestartOnly {
    pub listener_changed: bool,
    pub manager_api_changed: bool,
}

impl RestartOnly {
    pub fn any(&self) -> bool {
        self.listener_changed || self.manager_api_changed
    }
}

/// Carry the running listener and manager API settings into `new`.
pub fn retain_restart_only(old: &GatewayConfig, new: &mut GatewayConfig) -> RestartOnly {
    let ignored = RestartOnly {
        listener_changed: old.listener != new.listener,
        manager_api_changed: old.manager_api != new.manager_api,
    };
    new.listener = old.listener.clone();
    new.manager_api = old.manager_api.clone();
    ignored
}
