//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use voice_gateway::config::{load_config, FileConfigSource};
use voice_gateway::gateway::{Gateway, IdleSessionHandler};
use voice_gateway::http::HttpServer;
use voice_gateway::lifecycle::{self, Shutdown};
use voice_gateway::modules::ProviderInitializer;
use voice_gateway::reload::ReloadTrigger;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Providers used across tests; `llm` picks the selected LLM entry.
pub fn sample_config(auth: &str, llm: &str) -> String {
    format!(
        r#"
[listener]
bind_address = "127.0.0.1:0"

{auth}

[selected_module]
VAD = "SileroVAD"
ASR = "FunASR"
LLM = "{llm}"

[VAD.SileroVAD]
type = "silero"

[ASR.FunASR]
type = "fun_local"

[LLM.ChatGLM]
type = "openai"

[LLM.DeepSeek]
type = "openai"
"#
    )
}

/// A gateway running on a loopback port, reading its config from a temp file.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub gateway: Arc<Gateway>,
    pub reload_tx: mpsc::UnboundedSender<ReloadTrigger>,
    pub shutdown: Arc<Shutdown>,
    pub config_path: PathBuf,
    _dir: TempDir,
}

impl TestGateway {
    pub fn rewrite_config(&self, contents: &str) {
        std::fs::write(&self.config_path, contents).unwrap();
    }

    /// Wait until the committed generation reaches `generation`.
    pub async fn wait_for_generation(&self, generation: u64) {
        for _ in 0..50 {
            if self.gateway.controller().current().generation >= generation {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("generation {generation} never committed");
    }

    /// Wait until no connection is registered.
    pub async fn wait_for_empty_registry(&self) {
        assert!(
            self.gateway
                .registry()
                .wait_for_drain(Duration::from_secs(5))
                .await,
            "registry never drained"
        );
    }
}

pub async fn start_gateway(addr: SocketAddr, config_toml: &str) -> TestGateway {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("gateway.toml");
    std::fs::write(&config_path, config_toml).unwrap();

    let mut config = load_config(&config_path).unwrap();
    config.listener.bind_address = addr.to_string();

    let runtime = lifecycle::assemble(
        config,
        Arc::new(FileConfigSource::new(&config_path)),
        Arc::new(ProviderInitializer),
        Arc::new(IdleSessionHandler::boxed),
    )
    .await
    .unwrap();

    let listener = TcpListener::bind(addr).await.unwrap();
    let server = HttpServer::new(runtime.gateway.clone());
    let server_shutdown = runtime.shutdown.subscribe();
    let reload_rx = runtime.reload_rx;
    tokio::spawn(async move {
        let _ = server.run(listener, reload_rx, server_shutdown).await;
    });

    TestGateway {
        addr,
        gateway: runtime.gateway,
        reload_tx: runtime.reload_tx,
        shutdown: runtime.shutdown,
        config_path,
        _dir: dir,
    }
}

/// Open a WebSocket to `path_and_query` with extra handshake headers.
pub async fn connect(
    addr: SocketAddr,
    path_and_query: &str,
    headers: &[(&'static str, &str)],
) -> Result<Client, tungstenite::Error> {
    let mut request = format!("ws://{addr}{path_and_query}").into_client_request()?;
    for (name, value) in headers {
        request
            .headers_mut()
            .insert(*name, HeaderValue::from_str(value).unwrap());
    }
    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

/// Next text frame, or `None` once the server closes.
pub async fn next_text(client: &mut Client) -> Option<String> {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")?;
        match next {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}
