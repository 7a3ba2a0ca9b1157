//! Configuration sources consulted on every reconfiguration.
//!
//! A source turns "the config currently in effect" into "the config that
//! should be in effect". Any failure is reported as unavailable and leaves
//! the running snapshot untouched.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::{GatewayConfig, ManagerApiConfig};
use crate::resilience::backoff::calculate_backoff;

/// Path on the manager API serving the gateway configuration.
pub const SERVER_CONFIG_PATH: &str = "/config/server-base";

/// Reasons a source could not produce a configuration.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("config file unavailable: {0}")]
    File(#[from] ConfigError),

    #[error("manager API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("manager API rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("manager API returned no configuration")]
    Empty,

    #[error("manager API not configured")]
    NotConfigured,
}

/// Where new configurations come from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Produce the configuration that should replace `current`.
    async fn fetch(&self, current: &GatewayConfig) -> Result<GatewayConfig, SourceError>;
}

/// Re-reads a TOML file on every fetch.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn fetch(&self, _current: &GatewayConfig) -> Result<GatewayConfig, SourceError> {
        let path = self.path.clone();
        let loaded = tokio::task::spawn_blocking(move || load_config(&path))
            .await
            .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
        Ok(loaded?)
    }
}

/// Envelope used by the manager API.
#[derive(Debug, Deserialize)]
struct ManagerResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<GatewayConfig>,
}

/// Fetches the configuration from the manager API named in the current config.
#[derive(Debug, Clone)]
pub struct HttpConfigSource {
    client: reqwest::Client,
}

impl HttpConfigSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_once(&self, api: &ManagerApiConfig) -> Result<GatewayConfig, SourceError> {
        let url = format!("{}{}", api.url.trim_end_matches('/'), SERVER_CONFIG_PATH);
        let response: ManagerResponse = self
            .client
            .post(url)
            .bearer_auth(&api.secret)
            .timeout(Duration::from_secs(api.timeout_secs))
            .json(&serde_json::json!({}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.code != 0 {
            return Err(SourceError::Rejected {
                code: response.code,
                message: response.msg,
            });
        }
        response.data.ok_or(SourceError::Empty)
    }
}

impl Default for HttpConfigSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn fetch(&self, current: &GatewayConfig) -> Result<GatewayConfig, SourceError> {
        let api = &current.manager_api;
        if !api.is_enabled() {
            return Err(SourceError::NotConfigured);
        }

        let max_attempts = api.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(api).await {
                Ok(config) => return Ok(config),
                // A definitive answer from the API is not retried.
                Err(e @ (SourceError::Rejected { .. } | SourceError::Empty)) => return Err(e),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = calculate_backoff(attempt, api.base_delay_ms, api.max_delay_ms);
                    tracing::warn!(attempt, delay = ?delay, error = %e, "Config fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn file_source_reads_latest_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\nidle_timeout_secs = 30").unwrap();

        let source = FileConfigSource::new(file.path());
        let config = source.fetch(&GatewayConfig::default()).await.unwrap();
        assert_eq!(config.session.idle_timeout_secs, 30);
    }

    #[tokio::test]
    async fn file_source_reports_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nmax_connections = 0").unwrap();

        let source = FileConfigSource::new(file.path());
        let err = source.fetch(&GatewayConfig::default()).await.unwrap_err();
        assert!(matches!(err, SourceError::File(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn http_source_requires_url() {
        let source = HttpConfigSource::new();
        let err = source.fetch(&GatewayConfig::default()).await.unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured));
    }
}
