//! Database connection configuration.
//!
//! This module provides the `ConnectionConfig` struct for the single connection a
//! table holds open.

use crate::models::Dialect;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Configuration for the connection backing one table.
///
/// # Security
/// This struct intentionally does NOT store passwords or credentials.
/// Credentials travel only inside the database URL handed to the connection
/// factory and are redacted before they reach logs or errors.
///
/// # Example
/// ```rust
/// use warehouse_core::config::ConnectionConfig;
///
/// let config = ConnectionConfig::new("localhost".to_string())
///     .with_port(3306)
///     .with_database("prosper".to_string())
///     .with_username("warehouse".to_string());
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Optional port number; the dialect default applies when absent
    #[serde(default)]
    pub port: Option<u16>,
    /// Optional database name
    #[serde(default)]
    pub database: Option<String>,
    /// Optional username (password handled separately)
    #[serde(default)]
    pub username: Option<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Per-statement timeout in seconds, applied as a session setting
    #[serde(default = "default_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            database: None,
            username: None,
            connect_timeout_secs: DEFAULT_TIMEOUT_SECS,
            query_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig({}{}{})",
            self.host,
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database
                .as_ref()
                .map_or_else(String::new, |db| format!("/{}", db))
        )
        // Intentionally omit username and never include credentials
    }
}

impl ConnectionConfig {
    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::error::TableError::configuration(
                "host cannot be empty",
            ));
        }

        if self.port == Some(0) {
            return Err(crate::error::TableError::configuration(
                "port must be greater than 0",
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(crate::error::TableError::configuration(
                "connect_timeout_secs must be greater than 0",
            ));
        }

        if self.query_timeout_secs == 0 {
            return Err(crate::error::TableError::configuration(
                "query_timeout_secs must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Creates a new connection config with safe defaults.
    pub fn new(host: String) -> Self {
        Self {
            host,
            ..Default::default()
        }
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }

    /// Builder method to set username.
    pub fn with_username(mut self, username: String) -> Self {
        self.username = Some(username);
        self
    }

    /// Builder method to set the per-statement timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-statement timeout as a `Duration`.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Builds a credential-free connection URL for the given dialect.
    ///
    /// Used when no explicit database URL is supplied; authentication then
    /// relies on the driver's own mechanisms.
    ///
    /// # Errors
    /// Returns a configuration error for unsupported dialects or an
    /// unparseable host.
    pub fn to_url(&self, dialect: &Dialect) -> crate::Result<String> {
        let (scheme, default_port) = match dialect {
            Dialect::MySql => ("mysql", 3306),
            Dialect::Postgres => ("postgres", 5432),
            Dialect::Unsupported(name) => {
                return Err(crate::error::TableError::configuration(format!(
                    "cannot build a connection URL for unsupported dialect '{}'",
                    name
                )));
            }
        };

        let mut url = url::Url::parse(&format!(
            "{}://{}:{}",
            scheme,
            self.host,
            self.port.unwrap_or(default_port)
        ))
        .map_err(|e| {
            crate::error::TableError::configuration(format!("Invalid connection host: {}", e))
        })?;

        if let Some(username) = &self.username {
            url.set_username(username).map_err(|()| {
                crate::error::TableError::configuration("Invalid connection username")
            })?;
        }
        if let Some(database) = &self.database {
            url.set_path(database);
        }

        Ok(url.to_string())
    }
}
