//! Server configuration
//!
//! Loaded from a YAML or TOML file, then overridden by environment variables,
//! then by CLI flags.

use loglane_ingest::{IngestConfig, IpHashAlgorithm};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub ip_hash: IpHashConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite:...`, `postgres://...` or `postgresql://...`
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// PostgreSQL pool timeouts, in seconds
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IpHashConfig {
    #[serde(default)]
    pub secret: String,

    #[serde(default)]
    pub algorithm: IpHashAlgorithm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Let sqlx query logs through (they are capped at WARN otherwise)
    #[serde(default = "default_false")]
    pub log_sql_queries: bool,

    /// Log truncated message content of uploaded batches at DEBUG
    #[serde(default = "default_false")]
    pub log_payloads: bool,
}

/// Relational backend selected by the database URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

impl DatabaseBackend {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        if url.starts_with("sqlite:") {
            Ok(DatabaseBackend::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DatabaseBackend::Postgres)
        } else {
            Err(ConfigError::Validation(
                "database.url must start with sqlite:, postgres:// or postgresql://".to_string(),
            ))
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: DatabaseConfig::default(),
            ip_hash: IpHashConfig::default(),
            logging: LoggingConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_sql_queries: false,
            log_payloads: false,
        }
    }
}

// Keeps the secret out of debug output.
impl std::fmt::Debug for IpHashConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpHashConfig")
            .field("secret", &if self.secret.is_empty() { "" } else { "<redacted>" })
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from a YAML (default) or TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let expanded = shellexpand::tilde(path);
        let path = PathBuf::from(expanded.as_ref());

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            ConfigError::FileRead(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .map_err(|e| ConfigError::Parse(format!("TOML parse error: {}", e)))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::Parse(format!("YAML parse error: {}", e)))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("LOGLANE_HOST") {
            self.host = val;
        }
        if let Some(port) = parse_env::<u16>("LOGLANE_PORT")? {
            self.port = port;
        }

        // Database and hashing keep their unprefixed names
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(max) = parse_env::<u32>("LOGLANE_DB_MAX_CONNECTIONS")? {
            self.database.max_connections = max;
        }
        if let Ok(val) = std::env::var("IP_HASH") {
            self.ip_hash.secret = val;
        }
        if let Ok(val) = std::env::var("IP_HASH_ALGORITHM") {
            self.ip_hash.algorithm = val.parse().map_err(|e| ConfigError::InvalidEnv {
                name: "IP_HASH_ALGORITHM",
                message: format!("{}", e),
            })?;
        }

        if let Ok(val) = std::env::var("LOGLANE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("LOGLANE_LOG_FORMAT") {
            self.logging.format = match val.to_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: "LOGLANE_LOG_FORMAT",
                        message: format!("'{}' is not one of text, json", val),
                    });
                }
            };
        }
        if let Some(enabled) = parse_env::<bool>("LOGLANE_LOG_PAYLOADS")? {
            self.logging.log_payloads = enabled;
        }

        if let Some(enabled) = parse_env::<bool>("LOGLANE_VERIFY_REFERENCES")? {
            self.ingest.verify_references = enabled;
        }
        if let Some(enabled) = parse_env::<bool>("LOGLANE_TRUST_FORWARDED")? {
            self.ingest.trust_forwarded_headers = enabled;
        }

        Ok(())
    }

    /// Check required settings before anything is started
    pub fn validate(&self) -> Result<DatabaseBackend, ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database.url is required (or set DATABASE_URL)".to_string(),
            ));
        }
        let backend = DatabaseBackend::from_url(&self.database.url)?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }
        if self.database.acquire_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "database.acquire_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.ip_hash.secret.is_empty() {
            return Err(ConfigError::Validation(
                "ip_hash.secret is required (or set IP_HASH)".to_string(),
            ));
        }
        if self.ingest.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "ingest.max_body_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(backend)
    }

    /// Ingest settings with the logging switches folded in
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            log_payloads: self.logging.log_payloads,
            ..self.ingest.clone()
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidEnv {
                name,
                message: format!("'{}': {}", val, e),
            }),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    FileRead(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {name}: {message}")]
    InvalidEnv { name: &'static str, message: String },

    #[error("Invalid config: {0}")]
    Validation(String),
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_max_lifetime_secs() -> u64 {
    1800
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}
