//! Admin API on its own bind address.
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::gateway::Gateway;
use crate::lifecycle::shutdown::ShutdownSignal;

#[derive(Clone)]
pub struct AdminState {
    pub gateway: Arc<Gateway>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/connections", get(get_connections))
        .route("/admin/modules", get(get_modules))
        .route("/admin/reload", post(post_reload))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve_admin(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    let app = setup_admin_router(AdminState { gateway });
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.recv().await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfigSource, GatewayConfig};
    use crate::gateway::IdleSessionHandler;
    use crate::modules::ProviderInitializer;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn router() -> Router {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "a-long-enough-admin-key".into();
        let runtime = crate::lifecycle::assemble(
            config,
            Arc::new(FileConfigSource::new("/nonexistent/gateway.toml")),
            Arc::new(ProviderInitializer),
            Arc::new(IdleSessionHandler::boxed),
        )
        .await
        .unwrap();
        setup_admin_router(AdminState {
            gateway: runtime.gateway,
        })
    }

    fn request(method: &str, path: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(key) = key {
            builder = builder.header("authorization", format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_key() {
        let app = router().await;
        let response = app
            .clone()
            .oneshot(request("GET", "/admin/status", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(request("GET", "/admin/status", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_reports_generation() {
        let app = router().await;
        let response = app
            .oneshot(request("GET", "/admin/status", Some("a-long-enough-admin-key")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["generation"], 1);
        assert_eq!(json["active_connections"], 0);
    }

    #[tokio::test]
    async fn failed_reload_reports_unavailable_source() {
        let app = router().await;
        let response = app
            .oneshot(request("POST", "/admin/reload", Some("a-long-enough-admin-key")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
