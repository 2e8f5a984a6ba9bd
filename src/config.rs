use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::client::ClientOptions;
use crate::error::DEFAULT_BODY_EXCERPT_LIMIT;
use crate::request::{InvocationMode, MIN_LIVENESS_TIMEOUT};
use crate::retry::RetryPlan;
use crate::transport::{Endpoint, HttpOptions};
use crate::wire::WireFormat;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub wire: WireFormat,
    pub retry: RetryPlan,
    pub timeouts: TimeoutConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub call_path: String,
    pub feed_path: String,
    /// Query parameter carrying the session id on the feed URL; empty disables it.
    pub session_query_param: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3020".to_string(),
            call_path: "/call".to_string(),
            feed_path: "/sse".to_string(),
            session_query_param: "sessionId".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle window for streaming sessions.
    pub liveness_secs: u64,
    /// Bound on one buffered HTTP exchange.
    pub request_secs: u64,
    pub connect_secs: u64,
    /// Optional hard bound on a whole invocation.
    pub deadline_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            liveness_secs: 60,
            request_secs: 300,
            connect_secs: 10,
            deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub fallback_to_single_shot: bool,
    pub body_excerpt_limit: usize,
    pub default_mode: InvocationMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            fallback_to_single_shot: true,
            body_excerpt_limit: DEFAULT_BODY_EXCERPT_LIMIT,
            default_mode: InvocationMode::Incremental,
        }
    }
}

impl Config {
    /// Default location: `~/.tasklink/config.toml`.
    pub fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".tasklink").join("config.toml")
    }

    /// Load configuration from file, falling back to defaults when absent.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_path);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("invalid config file {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.liveness_secs).max(MIN_LIVENESS_TIMEOUT)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.timeouts.deadline_secs.map(Duration::from_secs)
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        let ep = &self.endpoint;
        let endpoint = Endpoint::from_base(&ep.base_url, &ep.call_path, &ep.feed_path)?;
        Ok(if ep.session_query_param.is_empty() {
            endpoint
        } else {
            endpoint.with_session_query_param(ep.session_query_param.clone())
        })
    }

    pub fn client_options(&self) -> Result<ClientOptions> {
        Ok(ClientOptions {
            endpoint: self.endpoint()?,
            wire: self.wire.clone(),
            retry: self.retry.clone(),
            fallback_to_single_shot: self.client.fallback_to_single_shot,
            body_excerpt_limit: self.client.body_excerpt_limit,
        })
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            connect_timeout: Duration::from_secs(self.timeouts.connect_secs),
            request_timeout: Duration::from_secs(self.timeouts.request_secs),
            ..HttpOptions::default()
        }
    }
}
