//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("sublog").join("sublog.db"))
        .unwrap_or_else(|| PathBuf::from("./data/sublog.db"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the bundled viewer
    #[serde(default = "default_frontend_dir")]
    pub frontend_dir: PathBuf,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_frontend_dir() -> PathBuf {
    PathBuf::from("./frontend")
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_dir: default_frontend_dir(),
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Broadcast hub tuning
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    /// Records buffered per viewer before it is disconnected
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_request_capacity() -> usize {
    1024
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            request_capacity: default_request_capacity(),
        }
    }
}

impl From<&HubSettings> for HubConfig {
    fn from(settings: &HubSettings) -> Self {
        HubConfig {
            queue_capacity: settings.queue_capacity,
            request_capacity: settings.request_capacity,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Nothing is logged here since this runs before logging is set up;
    /// hand the returned [`ConfigOrigin`] to [`ConfigOrigin::report`] once it is.
    pub fn load_default() -> (Self, ConfigOrigin) {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("sublog").join("config.toml")),
            Some(PathBuf::from("/etc/sublog/config.toml")),
            Some(PathBuf::from("./sublog.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths, |key| std::env::var(key).ok())
    }

    /// Load the first usable file among `paths`, then apply overrides
    fn load_first(
        paths: &[PathBuf],
        var: impl Fn(&str) -> Option<String>,
    ) -> (Self, ConfigOrigin) {
        let mut origin = ConfigOrigin::default();

        let mut config = paths
            .iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::load(path) {
                Ok(config) => {
                    origin.loaded = Some(path.clone());
                    Some(config)
                }
                Err(e) => {
                    origin.skipped.push(e);
                    None
                }
            })
            .unwrap_or_default();

        config.apply_overrides(var);
        (config, origin)
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(path) = var("SQLITE_PATH") {
            self.storage.db_path = PathBuf::from(path);
        }

        // Server overrides
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(host) = var("SUBLOG_HOST") {
            self.server.host = host;
        }
        if let Some(dir) = var("SUBLOG_FRONTEND_DIR") {
            self.server.frontend_dir = PathBuf::from(dir);
        }

        // Hub overrides
        if let Some(capacity) = var("SUBLOG_QUEUE_CAPACITY").and_then(|c| c.parse().ok()) {
            self.hub.queue_capacity = capacity;
        }

        // Logging overrides
        if let Some(level) = var("SUBLOG_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("SUBLOG_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Outcome of config discovery, kept until logging is available
#[derive(Debug, Default)]
pub struct ConfigOrigin {
    /// File the settings came from; `None` means defaults
    pub loaded: Option<PathBuf>,
    /// Files that exist but could not be read or parsed
    pub skipped: Vec<ConfigError>,
}

impl ConfigOrigin {
    /// Origin of an explicitly requested file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            loaded: Some(path.into()),
            skipped: Vec::new(),
        }
    }

    /// Log where the configuration came from
    pub fn report(&self) {
        for error in &self.skipped {
            tracing::warn!("Skipping config file: {}", error);
        }

        match &self.loaded {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Sublog Configuration
#
# Environment variables override these settings:
# - SQLITE_PATH
# - PORT
# - SUBLOG_HOST
# - SUBLOG_FRONTEND_DIR
# - SUBLOG_QUEUE_CAPACITY
# - SUBLOG_LOG_LEVEL
# - SUBLOG_LOG_FORMAT

[storage]
# SQLite database file (parent directory is created on startup)
db_path = "./data/sublog.db"

[server]
host = "0.0.0.0"
port = 8080

# Directory with the bundled viewer (index.html is served for unknown paths)
frontend_dir = "./frontend"

# Request timeout in seconds
request_timeout_secs = 10

# Maximum ingest body size in bytes
max_body_size = 10485760

[hub]
# Records buffered per viewer; a viewer that falls this far behind is disconnected
queue_capacity = 256

# Pending hub requests before ingestion waits
request_capacity = 1024

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
