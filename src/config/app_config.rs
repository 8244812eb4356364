use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::domain::DomainError;

static TABLE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z_][a-z0-9_]{0,62}$").expect("table name pattern is valid"));

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub hashing: HashingConfig,
    pub logging: LoggingConfig,
}

/// Row store connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
    /// Name of the user table
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/users".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            table: "users".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Supported credential hashing schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashingScheme {
    /// Self-salting Argon2id PHC strings, no salt column
    #[default]
    Argon2,
    /// PBKDF2-HMAC-SHA256 with a separately stored salt
    Pbkdf2,
}

impl std::fmt::Display for HashingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashingScheme::Argon2 => write!(f, "argon2"),
            HashingScheme::Pbkdf2 => write!(f, "pbkdf2"),
        }
    }
}

impl std::str::FromStr for HashingScheme {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "argon2" | "argon2id" => Ok(HashingScheme::Argon2),
            "pbkdf2" => Ok(HashingScheme::Pbkdf2),
            _ => Err(DomainError::configuration(format!(
                "Unknown hashing scheme: {}. Valid schemes: argon2, pbkdf2",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    pub scheme: HashingScheme,
    /// Iteration count for PBKDF2, ignored by Argon2
    pub pbkdf2_iterations: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            scheme: HashingScheme::default(),
            pbkdf2_iterations: 100_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings that would only fail later at query time
    pub fn validate(&self) -> Result<(), DomainError> {
        if !TABLE_NAME_PATTERN.is_match(&self.database.table) {
            return Err(DomainError::configuration(format!(
                "Invalid table name '{}': use lowercase letters, digits and underscores",
                self.database.table
            )));
        }

        if self.database.max_connections == 0 {
            return Err(DomainError::configuration(
                "database.max_connections must be at least 1",
            ));
        }

        if self.hashing.scheme == HashingScheme::Pbkdf2 && self.hashing.pbkdf2_iterations == 0 {
            return Err(DomainError::configuration(
                "hashing.pbkdf2_iterations must be at least 1",
            ));
        }

        Ok(())
    }
}
