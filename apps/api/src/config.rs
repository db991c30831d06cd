//! API server configuration.
//!
//! Configuration is loaded from `TECHSHOP_*` environment variables with
//! fallback to defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use techshop_checkout::CheckoutConfig;
use techshop_db::DbConfig;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP port (default: 9999)
    pub port: u16,

    /// SQLite database file (default: techshop.db)
    pub db_path: String,

    /// Pool size (default: 5)
    pub db_max_connections: u32,

    /// Inventory snapshot bound in milliseconds (default: 3000)
    pub snapshot_timeout_ms: u64,

    /// Per-decrement bound in milliseconds (default: 2000)
    pub decrement_timeout_ms: u64,

    /// Partial checkout when the request does not say (default: false)
    pub allow_partial: bool,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = ApiConfig {
            port: parse(&lookup, "TECHSHOP_PORT", 9999)?,
            db_path: lookup("TECHSHOP_DB_PATH").unwrap_or_else(|| "techshop.db".to_string()),
            db_max_connections: parse(&lookup, "TECHSHOP_DB_MAX_CONNECTIONS", 5)?,
            snapshot_timeout_ms: parse(&lookup, "TECHSHOP_SNAPSHOT_TIMEOUT_MS", 3000)?,
            decrement_timeout_ms: parse(&lookup, "TECHSHOP_DECREMENT_TIMEOUT_MS", 2000)?,
            allow_partial: parse(&lookup, "TECHSHOP_ALLOW_PARTIAL", false)?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("TECHSHOP_DB_MAX_CONNECTIONS".to_string()));
        }
        if config.snapshot_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("TECHSHOP_SNAPSHOT_TIMEOUT_MS".to_string()));
        }
        if config.decrement_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("TECHSHOP_DECREMENT_TIMEOUT_MS".to_string()));
        }

        Ok(config)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.db_path).max_connections(self.db_max_connections)
    }

    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig::default()
            .snapshot_timeout(Duration::from_millis(self.snapshot_timeout_ms))
            .decrement_timeout(Duration::from_millis(self.decrement_timeout_ms))
            .allow_partial(self.allow_partial)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.db_path, "techshop.db");
        assert_eq!(config.db_max_connections, 5);
        assert!(!config.allow_partial);

        let checkout = config.checkout_config();
        assert_eq!(checkout.snapshot_timeout, Duration::from_secs(3));
        assert_eq!(checkout.decrement_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("TECHSHOP_PORT", "8080"),
            ("TECHSHOP_ALLOW_PARTIAL", "true"),
            ("TECHSHOP_DECREMENT_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.checkout_config().allow_partial);
        assert_eq!(
            config.checkout_config().decrement_timeout,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("TECHSHOP_PORT", "http")]),
            Err(ConfigError::InvalidValue(key)) if key == "TECHSHOP_PORT"
        ));
        assert!(load(&[("TECHSHOP_DB_MAX_CONNECTIONS", "0")]).is_err());
        assert!(load(&[("TECHSHOP_ALLOW_PARTIAL", "maybe")]).is_err());
    }
}
