//! TOML-based configuration.
//!
//! Supports a config file (citystore.toml) with environment variable
//! expansion.
//!
//! Example configuration:
//! ```toml
//! [database]
//! dialect = "postgres"
//! connection_string = "${CITYDB_CONNECTION_STRING}"
//!
//! [import]
//! pool_size = 4
//! queue_size = 128
//!
//! [cache]
//! cache_size = 200000
//! concurrency_level = 4
//! drain_factor = 0.85
//!
//! [resolver]
//! retries = 1
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Target database.
    pub database: DatabaseSettings,

    /// Import pipeline tuning.
    pub import: ImportSettings,

    /// Id cache tuning.
    pub cache: CacheSettings,

    /// XLink resolver tuning.
    pub resolver: ResolverSettings,
}

/// Target database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQL dialect: "postgres", "oracle" or "sqlite".
    pub dialect: String,

    /// Connection string (supports ${ENV_VAR} expansion).
    pub connection_string: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            dialect: "postgres".to_string(),
            connection_string: String::new(),
        }
    }
}

impl DatabaseSettings {
    /// Get the dialect type.
    pub fn dialect_type(&self) -> Result<Dialect, SettingsError> {
        match self.dialect.as_str() {
            "postgres" => Ok(Dialect::Postgres),
            "oracle" => Ok(Dialect::Oracle),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(SettingsError::UnsupportedDialect(other.to_string())),
        }
    }

    /// Get the connection string with environment variables expanded.
    pub fn resolved_connection_string(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.connection_string)
    }
}

/// Import pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Number of import worker threads.
    pub pool_size: usize,

    /// Depth of the bounded work queue.
    pub queue_size: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            pool_size: 2,
            queue_size: 64,
        }
    }
}

/// Id cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Total entries per cache across all shards.
    pub cache_size: usize,

    /// Number of shards; one per expected concurrent worker.
    pub concurrency_level: usize,

    /// Fraction of a full shard evicted per sweep (0, 1].
    pub drain_factor: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_size: 200_000,
            concurrency_level: 4,
            drain_factor: 0.85,
        }
    }
}

/// XLink resolver settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Extra resolution passes after the first.
    pub retries: u32,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self { retries: 1 }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `CITYSTORE_CONFIG`
    /// 2. `./citystore.toml`
    /// 3. `~/.config/citystore/citystore.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("CITYSTORE_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("citystore.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("citystore").join("citystore.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Defaults if no config file found.
        Ok(Settings::default())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.database.dialect_type()?;

        if self.import.pool_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "import.pool_size must be positive".to_string(),
            ));
        }
        if self.import.queue_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "import.queue_size must be positive".to_string(),
            ));
        }
        if self.cache.cache_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "cache.cache_size must be positive".to_string(),
            ));
        }
        if self.cache.concurrency_level == 0 {
            return Err(SettingsError::InvalidConfig(
                "cache.concurrency_level must be positive".to_string(),
            ));
        }
        if !(self.cache.drain_factor > 0.0 && self.cache.drain_factor <= 1.0) {
            return Err(SettingsError::InvalidConfig(format!(
                "cache.drain_factor must be in (0, 1], got {}",
                self.cache.drain_factor
            )));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            // Check for ${VAR} or $VAR
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(ch);
                    chars.next();
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // Just a lone $, keep it
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}
