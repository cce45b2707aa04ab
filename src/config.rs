use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderValue;
use clap::Parser;
use rentbook_sqlite::SqliteStorage;
use serde::Deserialize;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::{
    exchange::ImportMode,
    storage::{InMemoryStorage, StorageBackend, StorageError},
};

#[derive(Parser, Debug)]
#[command(name = "rentbook", about = "rentbook - property rental management API")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "rentbook.toml")]
    pub config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// SQLite database path; selects the sqlite backend (overrides config file)
    #[arg(short, long)]
    pub database: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid listen address: {0}")]
    ListenAddr(#[from] std::net::AddrParseError),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,

    /// Database file for the sqlite backend.
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DataConfig {
    #[serde(default)]
    pub import_mode: ImportMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_path() -> String {
    "rentbook.db".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::default(),
            path: default_db_path(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl StorageConfig {
    /// Opens the configured backend. The caller owns the handle and closes it.
    pub fn open(&self) -> Result<Arc<dyn StorageBackend>, StorageError> {
        let storage: Arc<dyn StorageBackend> = match self.backend {
            StorageKind::Memory => Arc::new(InMemoryStorage::new()),
            StorageKind::Sqlite => Arc::new(SqliteStorage::open(&self.path)?),
        };
        Ok(storage)
    }
}

impl CorsConfig {
    pub fn layer(&self) -> CorsLayer {
        let origins = if self.allowed_origins.iter().any(|o| o == "*") {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(
                self.allowed_origins
                    .iter()
                    .filter_map(|o| o.parse::<HeaderValue>().ok()),
            )
        };
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads the config file if it exists, then applies CLI overrides.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: cli.config.clone(),
                    source,
                })
            }
        };

        // CLI overrides
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref path) = cli.database {
            config.storage.backend = StorageKind::Sqlite;
            config.storage.path = path.clone();
        }

        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.server.host, self.server.port).parse()?)
    }
}
