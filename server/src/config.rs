//! Server configuration.

use std::str::FromStr;
use std::time::Duration;

use mockva_common::{constants, MockvaError, Result};

/// Where balances and ledger entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = MockvaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(MockvaError::ConfigurationError(format!(
                "unknown storage backend {other}"
            ))),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL. Takes precedence over the component fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
    /// Pool size.
    pub max_connections: u32,
    /// Apply embedded migrations at startup.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: String::new(),
            name: "mockva".to_string(),
            max_connections: 10,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL, composed from the component fields when no explicit
    /// URL was given.
    pub fn url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        if self.password.is_empty() {
            format!(
                "postgres://{}@{}:{}/{}",
                self.username, self.host, self.port, self.name
            )
        } else {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.name
            )
        }
    }
}

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub database: DatabaseConfig,
    /// Deadline applied to every transfer request.
    pub transfer_timeout: Duration,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Postgres,
            database: DatabaseConfig::default(),
            transfer_timeout: constants::default_transfer_timeout(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_var("PORT", &port)?;
        }
        if let Some(backend) = lookup("STORAGE_BACKEND") {
            config.storage_backend = backend.parse()?;
        }

        let db = &mut config.database;
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.is_empty()) {
            db.url = Some(url);
        }
        if let Some(host) = lookup("POSTGRES_HOST") {
            db.host = host;
        }
        if let Some(port) = lookup("POSTGRES_PORT") {
            db.port = parse_var("POSTGRES_PORT", &port)?;
        }
        if let Some(username) = lookup("POSTGRES_USERNAME") {
            db.username = username;
        }
        if let Some(password) = lookup("POSTGRES_PASSWORD") {
            db.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            db.name = name;
        }
        if let Some(max) = lookup("DB_MAX_CONNECTIONS") {
            db.max_connections = parse_var("DB_MAX_CONNECTIONS", &max)?;
        }
        if let Some(run) = lookup("RUN_MIGRATIONS") {
            db.run_migrations = parse_var("RUN_MIGRATIONS", &run)?;
        }

        if let Some(ms) = lookup("TRANSFER_TIMEOUT_MS") {
            config.transfer_timeout = Duration::from_millis(parse_var("TRANSFER_TIMEOUT_MS", &ms)?);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(MockvaError::ConfigurationError("Listen port cannot be 0".to_string()));
        }

        if self.storage_backend == StorageBackend::Postgres {
            let db = &self.database;
            if db.url.is_none() && (db.host.is_empty() || db.name.is_empty()) {
                return Err(MockvaError::ConfigurationError(
                    "Database URL cannot be empty".to_string(),
                ));
            }
            if db.max_connections == 0 {
                return Err(MockvaError::ConfigurationError(
                    "Database pool needs at least one connection".to_string(),
                ));
            }
        }

        if self.transfer_timeout.is_zero() {
            return Err(MockvaError::ConfigurationError(
                "Transfer timeout cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.port)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MockvaError::ConfigurationError(format!("invalid value for {key}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.database.url(), "postgres://postgres@localhost:5432/mockva");
    }

    #[test]
    fn test_from_component_variables() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("POSTGRES_HOST", "db"),
            ("POSTGRES_PORT", "6543"),
            ("POSTGRES_USERNAME", "mockva"),
            ("POSTGRES_PASSWORD", "secret"),
            ("DB_NAME", "ledger"),
            ("TRANSFER_TIMEOUT_MS", "2500"),
            ("RUN_MIGRATIONS", "false"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.database.url(), "postgres://mockva:secret@db:6543/ledger");
        assert_eq!(config.transfer_timeout, Duration::from_millis(2500));
        assert!(!config.database.run_migrations);
    }

    #[test]
    fn test_database_url_wins() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://u:p@h/d"),
            ("POSTGRES_HOST", "ignored"),
        ]))
        .unwrap();
        assert_eq!(config.database.url(), "postgres://u:p@h/d");
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ServerConfig::default();
        config.port = 0;
        assert!(matches!(config.validate(), Err(MockvaError::ConfigurationError(_))));

        let mut config = ServerConfig::default();
        config.transfer_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
        config.storage_backend = StorageBackend::Memory;
        assert!(config.validate().is_ok());

        assert!(ServerConfig::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "redis")])).is_err());
    }
}
