//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file. All fields have defaults so an
//! empty file is a valid configuration; [`Config::validate`] rejects values
//! that would break the background loops (zero intervals, empty data dir).

use std::path::Path;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

/// Location of the per-organization databases.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding one database file per organization.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "genesis_sync_data".to_string()
}

/// Tuning for the sync storage engines.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisConfig {
    /// TTL in seconds for every resource family except vinterfaces; also the
    /// period of the ownership reconciler and the kubernetes aging TTL.
    #[serde(default = "default_aging_time")]
    pub aging_time: u64,

    /// TTL in seconds for the vinterface family only.
    #[serde(default = "default_vinterface_aging_time")]
    pub vinterface_aging_time: u64,

    /// Period in seconds of the persistence loop and the kubernetes aging
    /// loop.
    #[serde(default = "default_data_persistence_interval")]
    pub data_persistence_interval: u64,

    /// Peer refresh port used when the owning controller has a pod IP.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Peer refresh port used when reaching the controller by node IP.
    #[serde(default = "default_listen_node_port")]
    pub listen_node_port: u16,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            aging_time: default_aging_time(),
            vinterface_aging_time: default_vinterface_aging_time(),
            data_persistence_interval: default_data_persistence_interval(),
            listen_port: default_listen_port(),
            listen_node_port: default_listen_node_port(),
        }
    }
}

fn default_aging_time() -> u64 {
    86_400
}

fn default_vinterface_aging_time() -> u64 {
    604_800
}

fn default_data_persistence_interval() -> u64 {
    60
}

fn default_listen_port() -> u16 {
    20_417
}

fn default_listen_node_port() -> u16 {
    30_417
}

/// Main application configuration.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub genesis: GenesisConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed,
    /// or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.database.data_dir.is_empty() {
            return Err(ConfigError::MissingField { field: "data_dir" }.into());
        }
        if self.genesis.aging_time == 0 {
            return Err(ConfigError::InvalidValue {
                field: "aging_time",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.genesis.vinterface_aging_time == 0 {
            return Err(ConfigError::InvalidValue {
                field: "vinterface_aging_time",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.genesis.data_persistence_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "data_persistence_interval",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
