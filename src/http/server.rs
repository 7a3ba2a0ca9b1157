//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the streaming endpoint
//! - Answer non-upgrade requests with the health response
//! - Refuse upgrades over the connection cap before accept
//! - Hand upgraded sockets to the gateway
//! - Drain reload triggers into the reconfiguration controller
//! - Stop accepting on shutdown, then drain live connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::gateway::{Gateway, HandshakeRequest};
use crate::http::websocket::{is_upgrade_request, WsTransport};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;
use crate::reload::{ReconfigController, ReconfigurationError, ReloadReport, ReloadTrigger};

/// Body of the plain-HTTP health response.
pub const HEALTH_BODY: &str = "Server is running\n";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

/// HTTP front end for the connection gateway.
pub struct HttpServer {
    router: Router,
    gateway: Arc<Gateway>,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let state = AppState {
            gateway: gateway.clone(),
        };
        let router = Self::build_router(state);
        Self { router, gateway }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Serve plain TCP until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        reload_rx: mpsc::UnboundedReceiver<ReloadTrigger>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let reloader = tokio::spawn(reload_loop(self.gateway.controller().clone(), reload_rx));
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received, no longer accepting");
            })
            .await?;

        reloader.abort();
        drain(&self.gateway).await;
        tracing::info!("Gateway stopped");
        Ok(())
    }

    /// Serve TLS until `shutdown` fires, then drain.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        reload_rx: mpsc::UnboundedReceiver<ReloadTrigger>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "Gateway listening (TLS)");

        let reloader = tokio::spawn(reload_loop(self.gateway.controller().clone(), reload_rx));
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let handle = axum_server::Handle::new();
        let stopper = handle.clone();
        tokio::spawn(async move {
            shutdown.recv().await;
            tracing::info!("Shutdown signal received, no longer accepting");
            stopper.graceful_shutdown(None);
        });

        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        reloader.abort();
        drain(&self.gateway).await;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Run one reconfiguration on behalf of `trigger`.
pub async fn apply_reload(
    controller: &ReconfigController,
    trigger: ReloadTrigger,
) -> Result<ReloadReport, ReconfigurationError> {
    tracing::info!(trigger = trigger.as_str(), "Reloading configuration");
    controller.replace().await
}

async fn reload_loop(
    controller: Arc<ReconfigController>,
    mut reload_rx: mpsc::UnboundedReceiver<ReloadTrigger>,
) {
    while let Some(trigger) = reload_rx.recv().await {
        // Triggers queued behind this one are served by the same fetch.
        while reload_rx.try_recv().is_ok() {}
        // Failure is logged by the controller and leaves the snapshot alone.
        let _ = apply_reload(&controller, trigger).await;
    }
}

async fn drain(gateway: &Gateway) {
    let registry = gateway.registry();
    if registry.is_empty() {
        return;
    }
    let timeout = Duration::from_secs(
        gateway.controller().current().config.lifecycle.drain_timeout_secs,
    );
    tracing::info!(active = registry.len(), timeout = ?timeout, "Draining connections");
    if !registry.wait_for_drain(timeout).await {
        tracing::warn!(remaining = registry.len(), "Drain timeout elapsed, exiting anyway");
    }
}

/// The plain-HTTP response for non-upgrade requests.
pub fn health_response() -> Response {
    metrics::record_health_check();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (header::CONTENT_LENGTH, HeaderValue::from(HEALTH_BODY.len())),
        ],
        HEALTH_BODY,
    )
        .into_response()
}

async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !is_upgrade_request(&headers) {
        return health_response();
    }

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::debug!(peer = %peer, error = %rejection, "Malformed upgrade request");
            return rejection.into_response();
        }
    };

    let max_connections = state.gateway.controller().current().config.listener.max_connections;
    if state.gateway.registry().len() >= max_connections {
        tracing::warn!(peer = %peer, max_connections, "Connection limit reached, refusing upgrade");
        metrics::record_handshake("over_capacity");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    }

    let gateway = state.gateway.clone();
    upgrade
        .on_failed_upgrade(move |e| tracing::warn!(peer = %peer, error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| async move {
            let request = HandshakeRequest {
                headers,
                target: uri,
                peer_addr: Some(peer),
            };
            gateway
                .serve_connection(Box::new(WsTransport::new(socket)), request)
                .await;
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    #[tokio::test]
    async fn health_response_is_plain_text() {
        let response = health_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CONTENT_LENGTH],
            HEALTH_BODY.len().to_string()
        );
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], HEALTH_BODY.as_bytes());
    }

    #[tokio::test]
    async fn non_upgrade_request_on_any_path_gets_health() {
        use crate::config::{FileConfigSource, GatewayConfig};
        use crate::gateway::IdleSessionHandler;
        use crate::modules::ProviderInitializer;
        use tower::ServiceExt;

        let runtime = crate::lifecycle::assemble(
            GatewayConfig::default(),
            Arc::new(FileConfigSource::new("gateway.toml")),
            Arc::new(ProviderInitializer),
            Arc::new(IdleSessionHandler::boxed),
        )
        .await
        .unwrap();
        let server = HttpServer::new(runtime.gateway);

        let request = Request::builder()
            .uri("/xiaozhi/v1/?device-id=x")
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
            .body(Body::empty())
            .unwrap();
        let response = server.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], HEALTH_BODY.as_bytes());
    }
}
