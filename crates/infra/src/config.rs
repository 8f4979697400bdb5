//! Database configuration loading and representation.

use thiserror::Error;

/// Environment variable holding the SQLite connection URL.
pub const DATABASE_URL_VAR: &str = "GAVEL_DATABASE_URL";

/// Environment variable holding the pool size.
pub const MAX_CONNECTIONS_VAR: &str = "GAVEL_DATABASE_MAX_CONNECTIONS";

const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Connection settings for the relational store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Create the database file when it does not exist yet.
    pub create_if_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("{var} must be at least 1")]
    ZeroConnections { var: &'static str },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl DatabaseConfig {
    /// A private in-memory database, discarded when the pool closes.
    pub fn in_memory() -> Self {
        Self {
            url: IN_MEMORY_URL.to_string(),
            max_connections: 1,
            create_if_missing: true,
        }
    }

    /// Load from `GAVEL_DATABASE_URL` / `GAVEL_DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using an arbitrary variable lookup. Unset variables fall back to
    /// the in-memory defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::in_memory();

        if let Some(url) = lookup(DATABASE_URL_VAR).filter(|u| !u.trim().is_empty()) {
            config.url = url.trim().to_string();
        }

        if let Some(raw) = lookup(MAX_CONNECTIONS_VAR) {
            let max = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: MAX_CONNECTIONS_VAR,
                    value: raw.clone(),
                })?;
            if max == 0 {
                return Err(ConfigError::ZeroConnections {
                    var: MAX_CONNECTIONS_VAR,
                });
            }
            config.max_connections = max;
        }

        Ok(config)
    }

    /// In-memory databases live only as long as their connection.
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_to_in_memory() {
        let config = DatabaseConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DatabaseConfig::in_memory());
        assert!(config.is_in_memory());
    }

    #[test]
    fn reads_url_and_pool_size() {
        let config = DatabaseConfig::from_lookup(lookup(&[
            (DATABASE_URL_VAR, "sqlite://gavel.db"),
            (MAX_CONNECTIONS_VAR, " 4 "),
        ]))
        .unwrap();

        assert_eq!(config.url, "sqlite://gavel.db");
        assert_eq!(config.max_connections, 4);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn rejects_bad_pool_sizes() {
        assert_eq!(
            DatabaseConfig::from_lookup(lookup(&[(MAX_CONNECTIONS_VAR, "many")])),
            Err(ConfigError::InvalidValue {
                var: MAX_CONNECTIONS_VAR,
                value: "many".to_string(),
            })
        );
        assert_eq!(
            DatabaseConfig::from_lookup(lookup(&[(MAX_CONNECTIONS_VAR, "0")])),
            Err(ConfigError::ZeroConnections {
                var: MAX_CONNECTIONS_VAR
            })
        );
    }
}
