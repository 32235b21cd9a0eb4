//! Datasource definition: which table, in which dialect, with which keys.

use super::ConnectionConfig;
use crate::error::TableError;
use crate::models::{Dialect, KeySet, TableIdentity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Logical description of one pipeline table.
///
/// Loaded from JSON. The dialect string is resolved into a [`Dialect`] during
/// deserialization; an unknown name is kept as `Unsupported` and rejected when
/// the table is first touched.
///
/// # Example
/// ```rust
/// use warehouse_core::{Dialect, config::DatasourceConfig};
///
/// let config = DatasourceConfig::from_json_str(r#"{
///     "name": "evecentral_snapshot",
///     "dialect": "mysql",
///     "schema_name": "prosper",
///     "table_name": "snapshot_evecentral",
///     "primary_keys": ["price_date", "typeid"],
///     "data_keys": ["price_best", "price_avg"]
/// }"#).unwrap();
///
/// assert_eq!(config.dialect, Dialect::MySql);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasourceConfig {
    /// Datasource name, used in logs and as the connection's display name
    pub name: String,
    /// Target SQL dialect
    pub dialect: Dialect,
    /// Schema (MySQL database) the table lives in
    pub schema_name: String,
    /// Table name within the schema
    pub table_name: String,
    /// Declared primary and data keys
    #[serde(flatten)]
    pub keys: KeySet,
    /// Create script used when the table does not exist yet
    #[serde(default)]
    pub create_script: Option<PathBuf>,
    /// Connection settings (credentials handled separately)
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl DatasourceConfig {
    /// Creates a datasource definition with default connection settings.
    pub fn new(
        name: impl Into<String>,
        dialect: Dialect,
        table: TableIdentity,
        keys: KeySet,
    ) -> Self {
        Self {
            name: name.into(),
            dialect,
            schema_name: table.schema_name,
            table_name: table.table_name,
            keys,
            create_script: None,
            connection: ConnectionConfig::default(),
        }
    }

    /// Builder method to set the create script path.
    pub fn with_create_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.create_script = Some(path.into());
        self
    }

    /// Builder method to set connection settings.
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Schema-qualified table this datasource writes to.
    pub fn identity(&self) -> TableIdentity {
        TableIdentity::new(&self.schema_name, &self.table_name)
    }

    /// Parses a datasource definition from JSON text.
    ///
    /// # Errors
    /// Returns a configuration error if the JSON does not describe a datasource.
    pub fn from_json_str(raw: &str) -> crate::Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            TableError::configuration(format!("Invalid datasource definition: {}", e))
        })
    }

    /// Loads a datasource definition from a JSON file.
    ///
    /// A relative `create_script` path is resolved against the directory holding
    /// the definition file.
    ///
    /// # Errors
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TableError::configuration(format!(
                "Failed to read datasource definition {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_json_str(&raw)?;

        let resolved = match (&config.create_script, path.parent()) {
            (Some(script), Some(parent)) if script.is_relative() => Some(parent.join(script)),
            _ => None,
        };
        if resolved.is_some() {
            config.create_script = resolved;
        }

        if !config.dialect.is_supported() {
            tracing::warn!(
                "{}: unsupported dialect '{}' in {}",
                config.identity(),
                config.dialect.name(),
                path.display()
            );
        }

        Ok(config)
    }

    /// Validates the definition before any connection is opened.
    ///
    /// The dialect is not checked here: an unsupported dialect surfaces as
    /// `UnsupportedDialect` on first use.
    ///
    /// # Errors
    /// - `TableKeysMissing` when no primary keys are declared
    /// - `Configuration` for empty names, blank or duplicate keys, or invalid
    ///   connection settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(TableError::configuration("datasource name cannot be empty"));
        }
        if self.schema_name.trim().is_empty() {
            return Err(TableError::configuration("schema_name cannot be empty"));
        }
        if self.table_name.trim().is_empty() {
            return Err(TableError::configuration("table_name cannot be empty"));
        }

        if self.keys.primary_keys.is_empty() {
            return Err(TableError::TableKeysMissing {
                table: self.identity(),
            });
        }

        if self.keys.columns().any(|column| column.trim().is_empty()) {
            return Err(TableError::configuration(format!(
                "{}: key names cannot be empty",
                self.identity()
            )));
        }

        let duplicates = self.keys.duplicates();
        if !duplicates.is_empty() {
            return Err(TableError::configuration(format!(
                "{}: keys declared more than once: {}",
                self.identity(),
                duplicates.join(", ")
            )));
        }

        self.connection.validate()
    }
}
