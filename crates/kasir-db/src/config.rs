//! # Configuration
//!
//! Runtime settings for the database and the checkout engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KASIR_DB_PATH=/var/lib/kasir/kasir.db                              │
//! │     KASIR_DB_MAX_CONNECTIONS=8                                         │
//! │     KASIR_LOCK_TIMEOUT_SECS=5                                          │
//! │     KASIR_CHECKOUT_MAX_ATTEMPTS=3                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/kasir/kasir.toml (Linux)                                 │
//! │     ~/Library/Application Support/id.kasir.kasir/kasir.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/kasir/kasir.db"
//! max_connections = 5
//! lock_timeout_secs = 5
//!
//! [checkout]
//! max_attempts = 3
//! retry_backoff_ms = 50
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Seconds a checkout waits for another writer's lock before failing.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("id", "kasir", "kasir")
        .map(|dirs| dirs.data_dir().join("kasir.db"))
        .unwrap_or_else(|| PathBuf::from("kasir.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_lock_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            lock_timeout_secs: default_lock_timeout(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

/// `[checkout]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Attempts for `checkout_with_retry`, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff step between attempts. Attempt `n` waits `n × step`.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    50
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl CheckoutSettings {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Kasir configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KasirConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,
}

impl KasirConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (kasir.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing sections and fields take defaults.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path is required".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "database.min_connections cannot exceed max_connections".into(),
            ));
        }

        if self.database.lock_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "database.lock_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.checkout.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "checkout.max_attempts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Builds the pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .lock_timeout(Duration::from_secs(self.database.lock_timeout_secs))
            .run_migrations(self.database.run_migrations)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `KASIR_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("KASIR_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("KASIR_DB_MAX_CONNECTIONS") {
            match value.parse() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %value, "Ignoring invalid KASIR_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(value) = lookup("KASIR_LOCK_TIMEOUT_SECS") {
            match value.parse() {
                Ok(n) => self.database.lock_timeout_secs = n,
                Err(_) => warn!(value = %value, "Ignoring invalid KASIR_LOCK_TIMEOUT_SECS"),
            }
        }

        if let Some(value) = lookup("KASIR_CHECKOUT_MAX_ATTEMPTS") {
            match value.parse() {
                Ok(n) => self.checkout.max_attempts = n,
                Err(_) => warn!(value = %value, "Ignoring invalid KASIR_CHECKOUT_MAX_ATTEMPTS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("id", "kasir", "kasir")
            .map(|dirs| dirs.config_dir().join("kasir.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = KasirConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.lock_timeout_secs, 5);
        assert_eq!(config.checkout.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = KasirConfig::from_toml(
            r#"
            [database]
            path = "/tmp/kasir-test.db"
            lock_timeout_secs = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/kasir-test.db"));
        assert_eq!(config.database.lock_timeout_secs, 2);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.checkout.max_attempts, 3);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            KasirConfig::from_toml("[database]\nmax_connections = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("KASIR_DB_PATH", "/srv/kasir.db"),
            ("KASIR_DB_MAX_CONNECTIONS", "9"),
            ("KASIR_LOCK_TIMEOUT_SECS", "oops"),
            ("KASIR_CHECKOUT_MAX_ATTEMPTS", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = KasirConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/srv/kasir.db"));
        assert_eq!(config.database.max_connections, 9);
        assert_eq!(config.database.lock_timeout_secs, 5);
        assert_eq!(config.checkout.max_attempts, 1);
    }

    #[test]
    fn test_validation() {
        let mut config = KasirConfig::default();
        config.checkout.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = KasirConfig::default();
        config.database.min_connections = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_db_config() {
        let mut config = KasirConfig::default();
        config.database.lock_timeout_secs = 7;
        let db = config.db_config();
        assert_eq!(db.lock_timeout, Duration::from_secs(7));
        assert_eq!(db.max_connections, 5);
    }
}
