use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::http::apply_reload;
use crate::modules::ModuleDescription;
use crate::net::connection::ConnectionInfo;
use crate::reload::{ReconfigurationError, ReloadTrigger};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub generation: u64,
    pub active_connections: usize,
    pub max_connections: usize,
}

#[derive(Debug, Serialize)]
pub struct ModulesStatus {
    pub generation: u64,
    pub modules: Vec<ModuleDescription>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.gateway.controller().current();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        generation: snapshot.generation,
        active_connections: state.gateway.registry().len(),
        max_connections: snapshot.config.listener.max_connections,
    })
}

pub async fn get_connections(State(state): State<AdminState>) -> Json<Vec<ConnectionInfo>> {
    Json(state.gateway.registry().snapshot())
}

pub async fn get_modules(State(state): State<AdminState>) -> Json<ModulesStatus> {
    let snapshot = state.gateway.controller().current();
    Json(ModulesStatus {
        generation: snapshot.generation,
        modules: snapshot.modules.describe(),
    })
}

pub async fn post_reload(State(state): State<AdminState>) -> Response {
    match apply_reload(state.gateway.controller(), ReloadTrigger::Admin).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            let status = match e {
                ReconfigurationError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ReconfigurationError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ReconfigurationError::ModuleInit(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}
