//! Configuration module for FileDeck.

use serde::Deserialize;
use std::path::Path;

use crate::{FileDeckError, Result};

/// Client-side configuration (broker, registry and transfer endpoints).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the broker API (e.g. "http://127.0.0.1:8080").
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total timeout in seconds for broker and registry calls.
    ///
    /// Byte transfers are not bounded by this timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Size of the chunks a transfer body is streamed in.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    /// Bearer token sent to the broker API (empty = anonymous).
    #[serde(default)]
    pub api_token: String,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_user_agent() -> String {
    concat!("FileDeck/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            chunk_size_bytes: default_chunk_size(),
            api_token: String::new(),
            user_agent: default_user_agent(),
        }
    }
}

/// Broker service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable URL signed locations are issued against.
    ///
    /// Empty means `http://{host}:{port}`.
    #[serde(default)]
    pub public_url: String,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Lifetime of an issued signed location in seconds.
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
    /// HMAC key for signed locations (must be set to serve).
    #[serde(default)]
    pub signing_secret: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_signed_url_ttl() -> u64 {
    300
}

fn default_max_upload_size() -> u64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: String::new(),
            cors_origins: Vec::new(),
            signed_url_ttl_secs: default_signed_url_ttl(),
            signing_secret: String::new(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

impl ServerConfig {
    /// URL that signed locations are issued against.
    pub fn effective_public_url(&self) -> String {
        if self.public_url.is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else {
            self.public_url.clone()
        }
    }

    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the object storage directory.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "data/objects".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filedeck.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Client configuration.
    #[serde(default)]
    pub client: ClientConfig,
    /// Broker service configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FileDeckError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FileDeckError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEDECK_SIGNING_SECRET`: Override the signing secret
    /// - `FILEDECK_API_TOKEN`: Override the client API token
    /// - `FILEDECK_BASE_URL`: Override the client base URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("FILEDECK_SIGNING_SECRET") {
            if !secret.is_empty() {
                self.server.signing_secret = secret;
            }
        }
        if let Ok(token) = std::env::var("FILEDECK_API_TOKEN") {
            if !token.is_empty() {
                self.client.api_token = token;
            }
        }
        if let Ok(base_url) = std::env::var("FILEDECK_BASE_URL") {
            if !base_url.is_empty() {
                self.client.base_url = base_url;
            }
        }
    }

    /// Validate the client side of the configuration.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.client.base_url).map_err(|e| {
            FileDeckError::Config(format!("invalid client.base_url {:?}: {e}", self.client.base_url))
        })?;
        if self.client.chunk_size_bytes == 0 {
            return Err(FileDeckError::Config(
                "client.chunk_size_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate the configuration required to run the broker service.
    ///
    /// Returns an error if the signing secret is not set or the public URL is malformed.
    pub fn validate_server(&self) -> Result<()> {
        if self.server.signing_secret.is_empty() {
            return Err(FileDeckError::Config(
                "server.signing_secret is not set. \
                 Set it in config.toml or via FILEDECK_SIGNING_SECRET environment variable."
                    .to_string(),
            ));
        }
        url::Url::parse(&self.server.effective_public_url()).map_err(|e| {
            FileDeckError::Config(format!("invalid server.public_url: {e}"))
        })?;
        if self.server.signed_url_ttl_secs == 0 {
            return Err(FileDeckError::Config(
                "server.signed_url_ttl_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
