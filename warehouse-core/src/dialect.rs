//! Dialect-specific SQL rendering and statement execution.
//!
//! [`TableBackend`] is the per-dialect capability: it knows how to phrase the
//! existence check, header introspection, reads and writes for one table.
//! [`DialectExecutor`] resolves the backend for a configured [`Dialect`] and runs
//! the rendered statements through a [`ConnectionHandle`], wrapping every
//! driver error with the table it was issued for.

use crate::adapters::ConnectionHandle;
use crate::error::{Result, TableError};
use crate::models::{Dialect, KeySet, Row, TableIdentity};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Marker for a line comment in create scripts.
const LINE_COMMENT: &str = "--";

/// Column name to backend type name, captured from header introspection.
pub type ColumnTypes = BTreeMap<String, String>;

/// A SQL statement with positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with dialect placeholders
    pub sql: String,
    /// Values bound to the placeholders, in order
    pub params: Vec<JsonValue>,
}

impl Statement {
    /// A statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A statement with positional parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<JsonValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// SQL rendering for one supported dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableBackend {
    /// Backtick quoting, `?` placeholders
    MySql,
    /// Double-quote quoting, `$n` placeholders
    Postgres,
}

impl TableBackend {
    /// Selects the backend for a dialect.
    ///
    /// # Errors
    /// `UnsupportedDialect` for [`Dialect::Unsupported`].
    pub fn for_dialect(dialect: &Dialect, table: &TableIdentity) -> Result<Self> {
        match dialect {
            Dialect::MySql => Ok(Self::MySql),
            Dialect::Postgres => Ok(Self::Postgres),
            Dialect::Unsupported(name) => Err(TableError::unsupported_dialect(table, name.as_str())),
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    pub fn quote_identifier(self, identifier: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", identifier.replace('`', "``")),
            Self::Postgres => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    /// `schema`.`table` with dialect quoting.
    pub fn qualified_name(self, table: &TableIdentity) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(&table.schema_name),
            self.quote_identifier(&table.table_name)
        )
    }

    /// Positional placeholder for the 1-based parameter `index`.
    ///
    /// Postgres placeholders carry an explicit cast when the column type is
    /// known, since text parameters are not implicitly coerced there.
    fn placeholder(self, index: usize, column_type: Option<&str>) -> String {
        match (self, column_type) {
            (Self::MySql, _) => "?".to_string(),
            (Self::Postgres, Some(column_type)) => {
                format!("${}::{}", index, self.quote_identifier(column_type))
            }
            (Self::Postgres, None) => format!("${}", index),
        }
    }

    /// Rows naming the table in the catalog; one row per matching definition.
    pub fn existence_statement(self, table: &TableIdentity) -> Statement {
        let sql = match self {
            Self::MySql => {
                "SELECT CAST(TABLE_NAME AS CHAR) AS table_name \
                 FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?"
            }
            Self::Postgres => {
                "SELECT table_name::text AS table_name \
                 FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2"
            }
        };
        Statement::with_params(sql, schema_and_table(table))
    }

    /// Live column names and type names, in ordinal order.
    pub fn headers_statement(self, table: &TableIdentity) -> Statement {
        let sql = match self {
            Self::MySql => {
                "SELECT CAST(COLUMN_NAME AS CHAR) AS column_name, \
                 CAST(DATA_TYPE AS CHAR) AS data_type \
                 FROM INFORMATION_SCHEMA.COLUMNS \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
                 ORDER BY ORDINAL_POSITION"
            }
            Self::Postgres => {
                "SELECT column_name::text AS column_name, udt_name::text AS data_type \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY ordinal_position"
            }
        };
        Statement::with_params(sql, schema_and_table(table))
    }

    /// `SELECT` of `columns` filtered by equality on each filter column.
    ///
    /// A JSON null filter renders as `IS NULL` and binds no parameter.
    pub fn select_statement(
        self,
        table: &TableIdentity,
        columns: &[&str],
        filters: &Row,
        column_types: &ColumnTypes,
    ) -> Statement {
        let projection = columns
            .iter()
            .map(|column| self.quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {} FROM {}", projection, self.qualified_name(table));

        let mut params = Vec::new();
        let mut conditions = Vec::new();
        for (column, value) in filters {
            let quoted = self.quote_identifier(column);
            if value.is_null() {
                conditions.push(format!("{} IS NULL", quoted));
            } else {
                params.push(value.clone());
                let placeholder =
                    self.placeholder(params.len(), column_types.get(column).map(String::as_str));
                conditions.push(format!("{} = {}", quoted, placeholder));
            }
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        Statement::with_params(sql, params)
    }

    /// `INSERT` of the payload, upserting when the payload carries every primary
    /// key and at least one data column.
    pub fn write_statement(
        self,
        table: &TableIdentity,
        keys: &KeySet,
        payload: &Row,
        column_types: &ColumnTypes,
    ) -> Statement {
        let columns: Vec<&str> = payload.keys().map(String::as_str).collect();
        let quoted: Vec<String> = columns
            .iter()
            .map(|column| self.quote_identifier(column))
            .collect();
        let placeholders: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                self.placeholder(i + 1, column_types.get(*column).map(String::as_str))
            })
            .collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_name(table),
            quoted.join(", "),
            placeholders.join(", ")
        );

        let has_all_keys = keys
            .primary_keys
            .iter()
            .all(|key| payload.contains_key(key));
        let updates: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|column| !keys.is_primary_key(column))
            .collect();

        if has_all_keys && !updates.is_empty() {
            match self {
                Self::MySql => {
                    let assignments = updates
                        .iter()
                        .map(|column| {
                            let quoted = self.quote_identifier(column);
                            format!("{} = VALUES({})", quoted, quoted)
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    sql.push_str(" ON DUPLICATE KEY UPDATE ");
                    sql.push_str(&assignments);
                }
                Self::Postgres => {
                    let conflict = keys
                        .primary_keys
                        .iter()
                        .map(|key| self.quote_identifier(key))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let assignments = updates
                        .iter()
                        .map(|column| {
                            let quoted = self.quote_identifier(column);
                            format!("{} = EXCLUDED.{}", quoted, quoted)
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    sql.push_str(&format!(
                        " ON CONFLICT ({}) DO UPDATE SET {}",
                        conflict, assignments
                    ));
                }
            }
        }

        Statement::with_params(sql, payload.values().cloned().collect())
    }
}

fn schema_and_table(table: &TableIdentity) -> Vec<JsonValue> {
    vec![
        JsonValue::String(table.schema_name.clone()),
        JsonValue::String(table.table_name.clone()),
    ]
}

/// Splits a create script into executable statements.
///
/// Comment lines and blank lines never reach the backend, whether they stand
/// alone or trail a statement on the same line (`...); -- note`). A semicolon
/// inside a comment line never produces a statement. Semicolons inside string
/// literals are not recognized.
pub fn split_script(script: &str) -> Vec<String> {
    // Comment lines go first: a `;` inside one must not split a statement.
    // Pieces are stripped again, since text after the last `;` on a line
    // (`...); -- note`) starts a piece of its own.
    strip_comment_lines(script)
        .split(';')
        .map(strip_comment_lines)
        .filter(|statement| !statement.is_empty())
        .collect()
}

fn strip_comment_lines(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with(LINE_COMMENT)
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Executes table-scoped statements for a configured dialect.
#[derive(Debug, Clone)]
pub struct DialectExecutor {
    dialect: Dialect,
    table: TableIdentity,
}

impl DialectExecutor {
    /// Executor for `table` in `dialect`. The dialect is only checked when a
    /// statement runs.
    pub fn new(dialect: Dialect, table: TableIdentity) -> Self {
        Self { dialect, table }
    }

    /// Configured dialect.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Table every statement is scoped to.
    pub fn table(&self) -> &TableIdentity {
        &self.table
    }

    /// Resolves the rendering backend; fails for unsupported dialects.
    pub fn backend(&self) -> Result<TableBackend> {
        TableBackend::for_dialect(&self.dialect, &self.table)
    }

    /// Runs a raw query and returns its rows.
    ///
    /// # Errors
    /// - `UnsupportedDialect` if the dialect is not implemented
    /// - `QueryExecution` if the backend rejects the statement
    pub async fn execute_raw(
        &self,
        connection: &mut dyn ConnectionHandle,
        sql: &str,
    ) -> Result<Vec<Row>> {
        self.fetch(connection, &Statement::raw(sql)).await
    }

    /// Runs a rendered statement and returns its rows.
    pub async fn fetch(
        &self,
        connection: &mut dyn ConnectionHandle,
        statement: &Statement,
    ) -> Result<Vec<Row>> {
        self.backend()?;
        tracing::debug!("{}: query: {}", self.table, statement.sql);
        connection
            .fetch_all(statement)
            .await
            .map_err(|e| TableError::query_failed(&self.table, statement.sql.clone(), e))
    }

    /// Runs a rendered statement that returns no rows.
    pub async fn execute(
        &self,
        connection: &mut dyn ConnectionHandle,
        statement: &Statement,
    ) -> Result<u64> {
        self.backend()?;
        tracing::debug!("{}: execute: {}", self.table, statement.sql);
        connection
            .execute(statement)
            .await
            .map_err(|e| TableError::query_failed(&self.table, statement.sql.clone(), e))
    }

    /// Executes a multi-statement script, committing after each statement.
    ///
    /// Not atomic: when statement N fails, statements
    /// before it stay applied. Returns the number of statements executed.
    ///
    /// # Errors
    /// - `UnsupportedDialect` if the dialect is not implemented
    /// - `QueryExecution` naming the failing statement
    pub async fn execute_script(
        &self,
        connection: &mut dyn ConnectionHandle,
        script: &str,
    ) -> Result<usize> {
        self.backend()?;
        let statements = split_script(script);
        let total = statements.len();

        for (index, statement) in statements.iter().enumerate() {
            tracing::debug!(
                "{}: script statement {}/{}: {}",
                self.table,
                index + 1,
                total,
                statement
            );
            connection
                .execute_committed(statement)
                .await
                .map_err(|e| {
                    TableError::query_failed(
                        &self.table,
                        format!("script statement {} of {} failed", index + 1, total),
                        e,
                    )
                })?;
        }

        Ok(total)
    }

    /// Number of catalog entries matching the table.
    pub async fn existence_check(&self, connection: &mut dyn ConnectionHandle) -> Result<usize> {
        let statement = self.backend()?.existence_statement(&self.table);
        Ok(self.fetch(connection, &statement).await?.len())
    }

    /// Raw introspection rows describing the table's live columns.
    pub async fn fetch_headers(&self, connection: &mut dyn ConnectionHandle) -> Result<Vec<Row>> {
        let statement = self.backend()?.headers_statement(&self.table);
        self.fetch(connection, &statement).await
    }
}
