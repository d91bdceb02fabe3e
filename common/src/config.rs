// Configuration management with layered configuration (file, env)

use crate::models::{Credentials, Protocol, Timeouts, TransferDirection};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Re-run every source on this interval; run once when unset
    #[serde(default)]
    pub poll_interval_seconds: Option<u64>,
}

/// One configured remote source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub protocol: Protocol,
    pub direction: TransferDirection,
    pub connection: ConnectionConfig,
}

/// Everything a Connection needs to open and run batches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub auth: Credentials,
    #[serde(default = "default_directory_path")]
    pub directory_path: String,
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,
    #[serde(default = "default_maximum_transfer")]
    pub maximum_transfer: usize,
    #[serde(default)]
    pub duplicate_put_directory_paths: Vec<String>,
    #[serde(default)]
    pub delete_on_put: bool,
    #[serde(default = "default_open_timeout")]
    pub open_timeout_seconds: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_seconds: u64,
    #[serde(default)]
    pub create_directory_path: bool,
    #[serde(default = "default_passive_mode")]
    pub passive_mode: bool,
    #[serde(default = "default_local_directory")]
    pub local_directory: PathBuf,
    #[serde(default = "default_connection_test_pause")]
    pub connection_test_pause_ms: u64,
    #[serde(default)]
    pub retry_delay_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_directory_path() -> String {
    "./".to_string()
}

fn default_filename_pattern() -> String {
    "*".to_string()
}

fn default_maximum_transfer() -> usize {
    50
}

fn default_open_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

fn default_passive_mode() -> bool {
    true
}

fn default_local_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_connection_test_pause() -> u64 {
    1000
}

impl ConnectionConfig {
    /// Minimal configuration with defaults for every optional field
    pub fn new(host: impl Into<String>, port: u16, auth: Credentials) -> Self {
        Self {
            host: host.into(),
            port,
            auth,
            directory_path: default_directory_path(),
            filename_pattern: default_filename_pattern(),
            maximum_transfer: default_maximum_transfer(),
            duplicate_put_directory_paths: Vec::new(),
            delete_on_put: false,
            open_timeout_seconds: default_open_timeout(),
            read_timeout_seconds: default_read_timeout(),
            create_directory_path: false,
            passive_mode: default_passive_mode(),
            local_directory: default_local_directory(),
            connection_test_pause_ms: default_connection_test_pause(),
            retry_delay_ms: 0,
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            open: Duration::from_secs(self.open_timeout_seconds),
            read: Duration::from_secs(self.read_timeout_seconds),
        }
    }

    pub fn connection_test_pause(&self) -> Duration {
        Duration::from_millis(self.connection_test_pause_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Validate a single connection configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }
        if self.auth.username().trim().is_empty() {
            return Err("username cannot be empty".to_string());
        }
        if self.directory_path.trim().is_empty() {
            return Err("directory_path cannot be empty".to_string());
        }
        if self.filename_pattern.trim().is_empty() {
            return Err("filename_pattern cannot be empty".to_string());
        }
        if glob::Pattern::new(&self.filename_pattern).is_err() {
            return Err(format!(
                "filename_pattern '{}' is not a valid glob",
                self.filename_pattern
            ));
        }
        if self.maximum_transfer == 0 {
            return Err("maximum_transfer must be greater than 0".to_string());
        }
        if self.open_timeout_seconds == 0 || self.read_timeout_seconds == 0 {
            return Err("timeouts must be greater than 0".to_string());
        }
        if self
            .duplicate_put_directory_paths
            .iter()
            .any(|p| p.trim().is_empty())
        {
            return Err("duplicate_put_directory_paths cannot contain empty paths".to_string());
        }
        Ok(())
    }
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.observability.log_level.trim().is_empty() {
            return Err("log_level cannot be empty".to_string());
        }
        if self.worker.poll_interval_seconds == Some(0) {
            return Err("poll_interval_seconds must be greater than 0".to_string());
        }

        let mut names = std::collections::HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err("source name cannot be empty".to_string());
            }
            if !names.insert(source.name.as_str()) {
                return Err(format!("duplicate source name '{}'", source.name));
            }
            source
                .connection
                .validate()
                .map_err(|e| format!("source '{}': {}", source.name, e))?;
        }

        Ok(())
    }
}
