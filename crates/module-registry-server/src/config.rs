//! Server configuration
//!
//! This module handles hierarchical configuration loading from multiple sources:
//! - Default configuration file
//! - Environment-specific configuration file
//! - Environment variables
//! - Command-line arguments

use config::{Config, ConfigError, Environment, File};
use module_registry_db::IN_MEMORY_DATABASE_URL;
use module_registry_service::{snapshot::DEFAULT_SOURCE_HOST, DEFAULT_PROVIDER};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "MODULE_REGISTRY";

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server settings
    #[serde(default)]
    pub server: HttpServerConfig,

    /// Version registry settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Artifact blob store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Secret store settings
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Source host and pipeline limits
    #[serde(default)]
    pub source: SourceConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, used in retrieval handles
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Enable graceful shutdown
    #[serde(default = "default_true")]
    pub graceful_shutdown: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            graceful_shutdown: default_true(),
        }
    }
}

/// Version registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, or `memory`
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_database_url() -> String {
    IN_MEMORY_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    10
}

impl DatabaseConfig {
    /// Whether the in-memory registry is selected
    pub fn is_in_memory(&self) -> bool {
        self.url == IN_MEMORY_DATABASE_URL
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_seconds: default_connect_timeout(),
            run_migrations: default_true(),
        }
    }
}

/// Artifact blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory artifacts are written under
    #[serde(default = "default_blob_root")]
    pub root: PathBuf,

    /// Secret key holding the retrieval handle signing key
    #[serde(default = "default_signing_key_secret")]
    pub signing_key_secret: String,
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("data/artifacts")
}

fn default_signing_key_secret() -> String {
    "handle_signing_key".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_blob_root(),
            signing_key_secret: default_signing_key_secret(),
        }
    }
}

/// Secret store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Deployment prefix secrets are qualified under
    #[serde(default = "default_secret_prefix")]
    pub prefix: String,

    /// Secrets given inline, keyed by short key
    ///
    /// When empty, secrets are read from the environment.
    #[serde(default)]
    pub values: HashMap<String, String>,
}

fn default_secret_prefix() -> String {
    "module_registry".to_string()
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            prefix: default_secret_prefix(),
            values: HashMap::new(),
        }
    }
}

/// Source host and ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL repositories are cloned from
    #[serde(default = "default_source_host")]
    pub host: String,

    /// Provider every ingested module is registered under
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Snapshot retrieval limit in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,

    /// Packaging limit in seconds
    #[serde(default = "default_package_timeout")]
    pub package_timeout_seconds: u64,

    /// Directory scratch workspaces are created in
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
}

fn default_source_host() -> String {
    DEFAULT_SOURCE_HOST.to_string()
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_fetch_timeout() -> u64 {
    300
}

fn default_package_timeout() -> u64 {
    120
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: default_source_host(),
            provider: default_provider(),
            fetch_timeout_seconds: default_fetch_timeout(),
            package_timeout_seconds: default_package_timeout(),
            scratch_root: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting
    #[serde(default)]
    pub json_format: bool,

    /// Include timestamps
    #[serde(default = "default_true")]
    pub include_timestamps: bool,

    /// Include thread IDs
    #[serde(default)]
    pub include_thread_ids: bool,

    /// Include target module
    #[serde(default = "default_true")]
    pub include_target: bool,

    /// Log raw webhook events and signature mismatch detail
    #[serde(default)]
    pub debug: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Level actually applied, raised to `debug` by the debug toggle
    pub fn effective_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.level
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            include_timestamps: true,
            include_thread_ids: false,
            include_target: true,
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from files and environment
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default configuration file (config/default.toml)
    /// 2. Environment-specific file (config/{env}.toml)
    /// 3. Environment variables (MODULE_REGISTRY__*)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed
    pub fn load(config_dir: impl Into<PathBuf>, environment: &str) -> Result<Self, ConfigError> {
        let config_dir = config_dir.into();

        let config = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", environment))).required(false))
            // e.g., MODULE_REGISTRY__SERVER__PORT=8080
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
