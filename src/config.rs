//! Database configuration with environment-specific overrides.
//!
//! The crate is embedded by a control-plane binary, so configuration stays
//! deliberately small: a connection URL plus pool sizing, all overridable
//! through the environment.

use std::env;
use std::time::Duration;

use crate::error::{InventoryError, Result};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the inventory database pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// Load settings from `DATABASE_URL`, `INVENTORY_DB_MAX_CONNECTIONS` and
    /// `INVENTORY_DB_ACQUIRE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").map_err(|_| {
            InventoryError::InvalidArgument("DATABASE_URL is not set".to_string())
        })?;

        let mut config = Self::new(url);
        if let Ok(value) = env::var("INVENTORY_DB_MAX_CONNECTIONS") {
            config.max_connections = value.parse().map_err(|_| {
                InventoryError::InvalidArgument(format!(
                    "INVENTORY_DB_MAX_CONNECTIONS is not a number: '{value}'"
                ))
            })?;
        }
        if let Ok(value) = env::var("INVENTORY_DB_ACQUIRE_TIMEOUT_SECS") {
            let secs: u64 = value.parse().map_err(|_| {
                InventoryError::InvalidArgument(format!(
                    "INVENTORY_DB_ACQUIRE_TIMEOUT_SECS is not a number: '{value}'"
                ))
            })?;
            config.acquire_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied() {
        let config = DatabaseConfig::new("postgresql://localhost/inventory");
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(
            config.acquire_timeout,
            Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS)
        );
    }

    #[test]
    fn builder_overrides() {
        let config = DatabaseConfig::new("postgresql://localhost/inventory")
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(5));
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }
}
