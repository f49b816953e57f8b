//! Configuration for the Screeps exporter.

use screeps_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Routes served regardless of configuration.
pub const RESERVED_PATHS: [&str; 5] = ["/", "/health", "/ready", "/users/detail", "/room"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Game database settings.
    #[serde(default)]
    pub mongo: MongoConfig,

    /// Metric labeling settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:8000").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the combined metrics endpoint (default: "/metrics").
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            metrics_path: default_metrics_path(),
        }
    }
}

/// Game database (MongoDB) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string.
    #[serde(default = "default_mongo_url")]
    pub url: String,

    /// Database name (default: "screeps").
    #[serde(default = "default_database")]
    pub database: String,

    /// Users collection (default: "users").
    #[serde(default = "default_users_collection")]
    pub users_collection: String,

    /// Room objects collection (default: "rooms.objects").
    #[serde(default = "default_objects_collection")]
    pub objects_collection: String,

    /// Maximum pooled connections.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,

    /// Minimum pooled connections kept open.
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: u32,

    /// Idle time before a pooled connection is closed (milliseconds).
    #[serde(default = "default_max_idle_time")]
    pub max_idle_time_ms: u64,

    /// Connection timeout (milliseconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Server selection timeout (milliseconds).
    #[serde(default = "default_server_selection_timeout")]
    pub server_selection_timeout_ms: u64,
}

fn default_mongo_url() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "screeps".to_string()
}

fn default_users_collection() -> String {
    "users".to_string()
}

fn default_objects_collection() -> String {
    "rooms.objects".to_string()
}

fn default_max_pool_size() -> u32 {
    50
}

fn default_min_pool_size() -> u32 {
    5
}

fn default_max_idle_time() -> u64 {
    30_000
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_server_selection_timeout() -> u64 {
    5_000
}

impl MongoConfig {
    pub fn max_idle_time(&self) -> Duration {
        Duration::from_millis(self.max_idle_time_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: default_mongo_url(),
            database: default_database(),
            users_collection: default_users_collection(),
            objects_collection: default_objects_collection(),
            max_pool_size: default_max_pool_size(),
            min_pool_size: default_min_pool_size(),
            max_idle_time_ms: default_max_idle_time(),
            connect_timeout_ms: default_connect_timeout(),
            server_selection_timeout_ms: default_server_selection_timeout(),
        }
    }
}

/// Metric labeling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Label used in per-user families for users without a display name.
    #[serde(default = "default_unknown_user_label")]
    pub unknown_user_label: String,
}

fn default_unknown_user_label() -> String {
    "Unknown".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            unknown_user_label: default_unknown_user_label(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    ///
    /// Not validated: call [`validate`](Self::validate) once overrides are applied.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string, without validating it.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(content)?)
    }

    /// Parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http.listen.parse().map_err(|_| {
            ConfigError::Validation(format!("Invalid listen address: {}", self.http.listen))
        })
    }

    /// Keep the listen host but bind to `port`.
    pub fn override_port(&mut self, port: u16) -> Result<(), ConfigError> {
        let mut addr = self.listen_addr()?;
        addr.set_port(port);
        self.http.listen = addr.to_string();
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if !self.http.metrics_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if RESERVED_PATHS.contains(&self.http.metrics_path.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} collides with a built-in route",
                self.http.metrics_path
            )));
        }

        if self.mongo.url.is_empty() {
            return Err(ConfigError::Validation(
                "mongo.url must not be empty".to_string(),
            ));
        }

        let url = &self.mongo.url;
        if !url.starts_with("mongodb://") && !url.starts_with("mongodb+srv://") {
            return Err(ConfigError::Validation(format!(
                "mongo.url must use the mongodb:// or mongodb+srv:// scheme, got {}",
                self.mongo.url
            )));
        }

        if self.mongo.database.is_empty() {
            return Err(ConfigError::Validation(
                "mongo.database must not be empty".to_string(),
            ));
        }

        if self.mongo.max_pool_size == 0 {
            return Err(ConfigError::Validation(
                "max_pool_size must be > 0".to_string(),
            ));
        }

        if self.mongo.min_pool_size > self.mongo.max_pool_size {
            return Err(ConfigError::Validation(
                "min_pool_size must be <= max_pool_size".to_string(),
            ));
        }

        if self.mongo.connect_timeout_ms == 0 || self.mongo.server_selection_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "mongo timeouts must be > 0".to_string(),
            ));
        }

        self.logging
            .level_filter()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(())
    }
}
