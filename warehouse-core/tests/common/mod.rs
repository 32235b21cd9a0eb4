//! In-memory backend for lifecycle and facade tests.
//!
//! `MockDatabase` answers information-schema queries from its own table state
//! and records every call made through its handles, so tests can assert how
//! many mutating statements reached the backend.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard};
use warehouse_core::{
    BoxError, ConnectionFactory, ConnectionHandle, DatasourceConfig, Dialect, KeySet, Row,
    Statement, TableIdentity,
};

/// A call observed by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch(String),
    Execute(String, Vec<Value>),
    Committed(String),
    Close,
}

impl Call {
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Execute(..) | Self::Committed(_))
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Catalog entries matching the table
    pub definitions: usize,
    /// Live columns of the table
    pub columns: Vec<String>,
    /// Columns the table gets when a `CREATE TABLE` statement runs
    pub create_columns: Vec<String>,
    /// Any statement containing this text fails
    pub fail_on: Option<String>,
    /// Rows returned for data reads
    pub rows: Vec<Row>,
    pub calls: Vec<Call>,
    pub closed: bool,
    /// A handle was dropped
    pub dropped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockDatabase {
    state: Arc<Mutex<MockState>>,
}

impl MockDatabase {
    /// A database where the table already exists with `columns`.
    pub fn with_table(columns: &[&str]) -> Self {
        let db = Self::default();
        {
            let mut state = db.state();
            state.definitions = 1;
            state.columns = columns.iter().map(|c| (*c).to_string()).collect();
        }
        db
    }

    /// A database where the table is absent; `CREATE TABLE` produces `columns`.
    pub fn without_table(create_columns: &[&str]) -> Self {
        let db = Self::default();
        db.state().create_columns = create_columns.iter().map(|c| (*c).to_string()).collect();
        db
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn fail_on(&self, fragment: &str) {
        self.state().fail_on = Some(fragment.to_string());
    }

    pub fn handle(&self) -> Box<dyn ConnectionHandle> {
        Box::new(MockHandle {
            state: Arc::clone(&self.state),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn committed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Committed(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Execute(sql, params) => Some((sql, params)),
                _ => None,
            })
            .collect()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Fetch(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn is_dropped(&self) -> bool {
        self.state().dropped
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn check(state: &MockState, sql: &str) -> Result<(), BoxError> {
        if state.closed {
            return Err(BoxError::from("connection closed"));
        }
        match &state.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => {
                Err(BoxError::from(format!("injected failure on '{}'", fragment)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ConnectionHandle for MockHandle {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, BoxError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Fetch(statement.sql.clone()));
        Self::check(&state, &statement.sql)?;

        let sql = statement.sql.to_lowercase();
        let rows = if sql.contains("information_schema.tables") {
            (0..state.definitions)
                .map(|_| row(json!({"table_name": "prices"})))
                .collect()
        } else if sql.contains("information_schema.columns") {
            state
                .columns
                .iter()
                .map(|column| row(json!({"column_name": column, "data_type": "text"})))
                .collect()
        } else {
            state.rows.clone()
        };
        Ok(rows)
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64, BoxError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Execute(
            statement.sql.clone(),
            statement.params.clone(),
        ));
        Self::check(&state, &statement.sql)?;
        Ok(1)
    }

    async fn execute_committed(&mut self, sql: &str) -> Result<(), BoxError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Committed(sql.to_string()));
        Self::check(&state, sql)?;

        if sql.to_uppercase().contains("CREATE TABLE") {
            state.definitions = state.definitions.max(1);
            state.columns = state.create_columns.clone();
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BoxError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Close);
        state.closed = true;
        Ok(())
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.dropped = true;
        }
    }
}

/// Factory handing out handles on a shared [`MockDatabase`].
#[derive(Debug, Clone)]
pub struct MockFactory(pub MockDatabase);

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn open(
        &self,
        _config: &DatasourceConfig,
    ) -> warehouse_core::Result<Box<dyn ConnectionHandle>> {
        Ok(self.0.handle())
    }
}

pub fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

pub fn prices_table() -> TableIdentity {
    TableIdentity::new("prosper", "prices")
}

/// `prosper.prices` keyed by `id` with data columns `value` and `ts`.
pub fn prices_config(dialect: Dialect) -> DatasourceConfig {
    DatasourceConfig::new(
        "prices",
        dialect,
        prices_table(),
        KeySet::new(["id"], ["value", "ts"]),
    )
}

pub const PRICES_SCRIPT: &str = "\
-- prices table
CREATE TABLE prosper.prices (
    id INT NOT NULL,
    value DOUBLE,
    ts TIMESTAMP,
    PRIMARY KEY (id)
);

-- lookup index
CREATE INDEX prices_ts ON prosper.prices (ts);
";
