//! Table lifecycle and data access for pipeline storage tables.
//!
//! A pipeline declares each table it writes by name, dialect, schema and
//! columns. Opening a [`TableConnection`] guarantees the table is usable before
//! any data flows: the table is created from a script if absent, and its live
//! columns must match the declared keys exactly.
//!
//! # Guarantees
//! - One connection per table, closed on every failure path and on drop
//! - Every error names the table it concerns
//! - Reads and writes are rejected before reaching the backend when they name
//!   undeclared columns
//! - Connection URLs are redacted before they reach logs or errors
//!
//! # Architecture
//! - [`dialect`]: per-dialect SQL rendering and statement execution
//! - [`validation`]: declared keys against live headers
//! - [`lifecycle`]: the Unchecked → Ready state machine
//! - [`table`]: the [`TableConnection`] facade
//! - [`adapters`]: collaborator traits and the sqlx-backed drivers

pub mod adapters;
pub mod config;
pub mod dialect;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod table;
pub mod validation;

// Re-export commonly used types
pub use adapters::{
    ConnectionFactory, ConnectionHandle, CreateScriptProvider, HeaderNormalizer,
    InformationSchemaNormalizer, SqlxConnectionFactory,
};
pub use config::{ConnectionConfig, DatasourceConfig};
pub use dialect::{ColumnTypes, DialectExecutor, Statement, TableBackend};
pub use error::{BoxError, Result, TableError};
pub use lifecycle::{LifecycleReport, TableLifecycleManager, TableState};
pub use models::{Dialect, HeaderSet, KeySet, Row, TableIdentity};
pub use table::TableConnection;
pub use validation::{HeaderMismatch, SchemaValidator};
