//! Data model shared by the lifecycle, the executor and the facade.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// A single result row: column name to JSON-compatible value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// SQL backend technology a table lives in.
///
/// Parsed once from configuration. Unrecognized names are kept in
/// [`Dialect::Unsupported`] so the failure can report what was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// MySQL / MariaDB
    MySql,
    /// PostgreSQL
    Postgres,
    /// Unrecognized name, kept as configured
    Unsupported(String),
}

impl Dialect {
    /// Parses a configuration string, case-insensitively.
    ///
    /// Accepts the legacy `postgress` spelling used by older datasource files.
    ///
    /// ```rust
    /// use warehouse_core::Dialect;
    ///
    /// assert_eq!(Dialect::parse("MySQL"), Dialect::MySql);
    /// assert_eq!(Dialect::parse("postgresql"), Dialect::Postgres);
    /// assert_eq!(Dialect::parse("oracle"), Dialect::Unsupported("oracle".to_string()));
    /// ```
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "mysql" => Self::MySql,
            "postgres" | "postgresql" | "postgress" | "pg" => Self::Postgres,
            _ => Self::Unsupported(value.to_string()),
        }
    }

    /// Returns true unless this is [`Dialect::Unsupported`].
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// Canonical configuration name; the original string for unsupported dialects.
    pub fn name(&self) -> &str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Unsupported(original) => original,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MySql => write!(f, "MySQL"),
            Self::Postgres => write!(f, "PostgreSQL"),
            Self::Unsupported(original) => write!(f, "unsupported ({})", original),
        }
    }
}

impl Serialize for Dialect {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Dialect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Schema-qualified table name. Scopes every query issued for a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdentity {
    /// Schema (MySQL database) holding the table
    pub schema_name: String,
    /// Table name within the schema
    pub table_name: String,
}

impl TableIdentity {
    /// Creates an identity from schema and table names.
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
        }
    }
}

impl std::fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.table_name)
    }
}

/// Expected columns of a table, split into primary and data keys.
///
/// Order is preserved: it is the column order used when a read does not name
/// its columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Columns forming the primary key; must not be empty
    #[serde(default)]
    pub primary_keys: Vec<String>,
    /// Non-key data columns
    #[serde(default)]
    pub data_keys: Vec<String>,
}

impl KeySet {
    /// Builds a key set from any iterables of column names.
    pub fn new<P, D>(primary_keys: P, data_keys: D) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            primary_keys: primary_keys.into_iter().map(Into::into).collect(),
            data_keys: data_keys.into_iter().map(Into::into).collect(),
        }
    }

    /// All declared columns, primary keys first, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.primary_keys
            .iter()
            .chain(self.data_keys.iter())
            .map(String::as_str)
    }

    /// The declared columns as a set, for comparison against live headers.
    pub fn expected_headers(&self) -> HeaderSet {
        self.columns().map(str::to_string).collect()
    }

    /// Whether `column` is one of the primary keys.
    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|key| key == column)
    }

    /// Whether `column` is a primary or data key.
    pub fn is_declared(&self, column: &str) -> bool {
        self.columns().any(|key| key == column)
    }

    /// Columns declared more than once across both key lists, sorted.
    pub fn duplicates(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for column in self.columns() {
            if !seen.insert(column) {
                duplicates.insert(column.to_string());
            }
        }
        duplicates.into_iter().collect()
    }
}

/// Column names observed on a live table.
pub type HeaderSet = BTreeSet<String>;
