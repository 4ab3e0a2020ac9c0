//! Server configuration
//!
//! Layered from built-in defaults, an optional TOML file (`candor.toml`, or
//! the path in `CANDOR_CONFIG`) and `CANDOR_*` environment variables. Nested
//! keys use a double underscore, e.g. `CANDOR_CACHE__TTL_SECS=120`.

use crate::storage::PoolSettings;
use candor_core::{CandorError, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";
const DEFAULT_CONFIG_FILE: &str = "candor.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_address: String,
    pub database_path: String,
    pub jwt_secret: String,
    pub log_level: String,
    pub cache: CacheSettings,
    pub database: DatabaseSettings,
    pub bootstrap: BootstrapSettings,
    pub auth: AuthSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            database_path: "data/candor.db".to_string(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            log_level: "info".to_string(),
            cache: CacheSettings::default(),
            database: DatabaseSettings::default(),
            bootstrap: BootstrapSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl DatabaseSettings {
    pub fn pool(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

/// Demo accounts seeded at startup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    pub enabled: bool,
    pub password: String,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            password: "password123".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub token_ttl_hours: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self { token_ttl_hours: 24 }
    }
}

impl AuthSettings {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("CANDOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let builder = Config::builder().add_source(File::with_name(&path).required(false));
        Self::build(builder)
    }

    /// Settings from a TOML document plus the environment, ignoring any file
    /// on disk.
    #[cfg(test)]
    pub fn from_toml(toml: &str) -> Result<Self> {
        let builder = Config::builder().add_source(File::from_str(toml, config::FileFormat::Toml));
        Self::build(builder)
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("CANDOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CandorError::Config(format!("Failed to load configuration: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.bind_address.trim().is_empty() {
            errors.push("bind_address must not be empty".to_string());
        }
        if self.database_path.trim().is_empty() {
            errors.push("database_path must not be empty".to_string());
        }
        if self.jwt_secret.is_empty() {
            errors.push("jwt_secret must not be empty".to_string());
        }
        if self.cache.sweep_interval_secs == 0 {
            errors.push("cache.sweep_interval_secs must be positive".to_string());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be positive".to_string());
        }
        if self.auth.token_ttl_hours <= 0 {
            errors.push("auth.token_ttl_hours must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CandorError::Config(errors.join("; ")))
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.bind_address, "0.0.0.0:5000");
        assert_eq!(settings.cache.ttl(), Duration::from_secs(600));
        assert_eq!(settings.cache.sweep_interval(), Duration::from_secs(60));
        assert_eq!(settings.database.pool().max_connections, 1);
        assert!(settings.bootstrap.enabled);
        assert_eq!(settings.auth.token_ttl_hours, 24);
        assert!(settings.uses_default_secret());
    }

    #[test]
    fn test_file_overrides() {
        let settings = Settings::from_toml(
            r#"
            bind_address = "127.0.0.1:8080"
            jwt_secret = "s3cret"

            [cache]
            ttl_secs = 30

            [bootstrap]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.bind_address, "127.0.0.1:8080");
        assert_eq!(settings.cache.ttl_secs, 30);
        assert_eq!(settings.cache.sweep_interval_secs, 60);
        assert!(!settings.bootstrap.enabled);
        assert!(!settings.uses_default_secret());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = Settings::from_toml(
            r#"
            [database]
            max_connections = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CandorError::Config(msg) if msg.contains("max_connections")));
    }
}
