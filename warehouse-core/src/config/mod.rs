//! Configuration types for pipeline tables.
//!
//! - `DatasourceConfig`: table identity, dialect and keys of one datasource
//! - `ConnectionConfig`: settings for the connection backing it
//!
//! # Security
//! These configuration structs intentionally do NOT store passwords or credentials.

mod connection;
mod datasource;

pub use connection::ConnectionConfig;
pub use datasource::DatasourceConfig;
