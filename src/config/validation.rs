//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (selected modules reference existing providers)
//! - Validate value ranges (connection cap > 0, addresses parse)
//! - Reject unusable secrets when the feature that needs them is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, at startup and on reload

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, ADMIN_KEY_PLACEHOLDER};
use crate::modules::ModuleKind;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("auth.auth_key must be set when auth is enabled")]
    MissingAuthKey,

    #[error("admin.api_key must be changed from the placeholder when admin is enabled")]
    WeakAdminKey,

    #[error("selected_module.{kind} = {name:?} has no matching [{kind}.{name}] section")]
    UnknownProvider { kind: ModuleKind, name: String },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if config.auth.enabled && config.auth.auth_key.is_empty() {
        errors.push(ValidationError::MissingAuthKey);
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() || config.admin.api_key == ADMIN_KEY_PLACEHOLDER {
            errors.push(ValidationError::WeakAdminKey);
        }
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    for kind in ModuleKind::ALL {
        if let Some(name) = config.selected_module.get(kind) {
            if !config.providers(kind).contains_key(name) {
                errors.push(ValidationError::UnknownProvider {
                    kind,
                    name: name.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Render a list of validation errors on one line.
pub fn describe_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
