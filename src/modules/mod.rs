//! Pluggable processing modules shared by connections.
//!
//! # Data Flow
//! ```text
//! GatewayConfig.selected_module + provider tables
//!     → initializer.rs (ModuleInitializer builds handles)
//!     → ModuleMap (only what was built this round)
//!     → ModuleSet::merge (per-field upsert over the previous set)
//!     → pinned by every connection constructed afterwards
//! ```
//!
//! # Design Decisions
//! - Handles are `Arc<dyn Module>`: connections share them by reference
//! - A set is never mutated in place; a replace produces a new set
//! - A capability missing from a rebuild keeps its previous handle

pub mod initializer;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub use initializer::{
    Capabilities, ModuleInitError, ModuleInitializer, ProviderInitializer, ProviderModule,
    RebuildFlags,
};

/// The processing capabilities a connection can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Vad,
    Asr,
    Llm,
    Memory,
    Intent,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 5] = [
        ModuleKind::Vad,
        ModuleKind::Asr,
        ModuleKind::Llm,
        ModuleKind::Memory,
        ModuleKind::Intent,
    ];

    /// Section name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Vad => "VAD",
            ModuleKind::Asr => "ASR",
            ModuleKind::Llm => "LLM",
            ModuleKind::Memory => "Memory",
            ModuleKind::Intent => "Intent",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An initialized processing module owned by an external collaborator.
///
/// The gateway never calls into a module; it only hands references to the
/// per-connection handler.
pub trait Module: Send + Sync + fmt::Debug {
    fn kind(&self) -> ModuleKind;

    /// Configured provider name (e.g. `FunASR`).
    fn name(&self) -> &str;

    /// Implementation type (e.g. `fun_local`).
    fn provider_type(&self) -> &str;
}

pub type ModuleHandle = Arc<dyn Module>;

/// Result of one initializer run: only the capabilities actually built.
pub type ModuleMap = HashMap<ModuleKind, ModuleHandle>;

/// The module handles in effect for a snapshot.
#[derive(Debug, Clone, Default)]
pub struct ModuleSet {
    pub vad: Option<ModuleHandle>,
    pub asr: Option<ModuleHandle>,
    pub llm: Option<ModuleHandle>,
    pub memory: Option<ModuleHandle>,
    pub intent: Option<ModuleHandle>,
}

impl ModuleSet {
    /// Build a set containing exactly the given modules.
    pub fn from_map(built: ModuleMap) -> Self {
        Self::default().merge(built)
    }

    pub fn get(&self, kind: ModuleKind) -> Option<&ModuleHandle> {
        self.slot(kind).as_ref()
    }

    fn slot(&self, kind: ModuleKind) -> &Option<ModuleHandle> {
        match kind {
            ModuleKind::Vad => &self.vad,
            ModuleKind::Asr => &self.asr,
            ModuleKind::Llm => &self.llm,
            ModuleKind::Memory => &self.memory,
            ModuleKind::Intent => &self.intent,
        }
    }

    fn slot_mut(&mut self, kind: ModuleKind) -> &mut Option<ModuleHandle> {
        match kind {
            ModuleKind::Vad => &mut self.vad,
            ModuleKind::Asr => &mut self.asr,
            ModuleKind::Llm => &mut self.llm,
            ModuleKind::Memory => &mut self.memory,
            ModuleKind::Intent => &mut self.intent,
        }
    }

    /// Upsert freshly built modules over this set.
    ///
    /// Capabilities absent from `built` keep their current handle.
    pub fn merge(&self, built: ModuleMap) -> Self {
        let mut merged = self.clone();
        for (kind, handle) in built {
            *merged.slot_mut(kind) = Some(handle);
        }
        merged
    }

    /// Summary of the providers in this set, for logs and the admin API.
    pub fn describe(&self) -> Vec<ModuleDescription> {
        ModuleKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.get(kind).map(|m| ModuleDescription {
                    kind,
                    name: m.name().to_string(),
                    provider_type: m.provider_type().to_string(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModuleDescription {
    pub kind: ModuleKind,
    pub name: String,
    pub provider_type: String,
}
