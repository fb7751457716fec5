//! Costing engine configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use cogs_core::CostingMethod;

use crate::pool::DbConfig;

/// Runtime configuration for a costing deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostingConfig {
    /// SQLite file (`COGS_DATABASE_PATH`, default `./costbook.db`)
    pub database_path: PathBuf,

    /// Method used by `ship()` / `process_return()` (`COGS_DEFAULT_METHOD`, default FIFO)
    pub default_method: CostingMethod,

    /// Pool size (`COGS_MAX_CONNECTIONS`, default 5)
    pub max_connections: u32,

    /// `tracing` filter directive for binaries (`COGS_LOG`, default `info`)
    pub log_filter: String,
}

impl Default for CostingConfig {
    fn default() -> Self {
        CostingConfig {
            database_path: PathBuf::from("./costbook.db"),
            default_method: CostingMethod::Fifo,
            max_connections: 5,
            log_filter: "info".to_string(),
        }
    }
}

impl CostingConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CostingConfig::default();

        let config = CostingConfig {
            database_path: lookup("COGS_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            default_method: match lookup("COGS_DEFAULT_METHOD") {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("COGS_DEFAULT_METHOD".to_string()))?,
                None => defaults.default_method,
            },

            max_connections: lookup("COGS_MAX_CONNECTIONS")
                .unwrap_or_else(|| defaults.max_connections.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("COGS_MAX_CONNECTIONS".to_string()))?,

            log_filter: lookup("COGS_LOG").unwrap_or(defaults.log_filter),
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("COGS_MAX_CONNECTIONS".to_string()));
        }

        if config.database_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("COGS_DATABASE_PATH".to_string()));
        }

        Ok(config)
    }

    /// Pool configuration for this deployment.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CostingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.default_method, CostingMethod::Fifo);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_overrides() {
        let config = CostingConfig::from_lookup(lookup(&[
            ("COGS_DATABASE_PATH", "/var/lib/costbook/ledger.db"),
            ("COGS_DEFAULT_METHOD", "avg"),
            ("COGS_MAX_CONNECTIONS", "8"),
            ("COGS_LOG", "cogs_db=debug"),
        ]))
        .unwrap();

        assert_eq!(config.default_method, CostingMethod::Avg);
        assert_eq!(config.db_config().max_connections, 8);
        assert_eq!(config.log_filter, "cogs_db=debug");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            CostingConfig::from_lookup(lookup(&[("COGS_DEFAULT_METHOD", "lifo")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(CostingConfig::from_lookup(lookup(&[("COGS_MAX_CONNECTIONS", "many")])).is_err());
        assert!(CostingConfig::from_lookup(lookup(&[("COGS_MAX_CONNECTIONS", "0")])).is_err());
    }
}
