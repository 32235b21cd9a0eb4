//! Table lifecycle: existence check, creation, header validation.
//!
//! A [`TableLifecycleManager`] makes a single forward pass:
//!
//! ```text
//! Unchecked ──exists──────────────► Validating ──match──► Ready
//!     │                                 ▲    └─mismatch─► Failed
//!     └──absent──► Creating ──created───┘
//!                     └──script error──────────────────► Failed
//! ```
//!
//! There are no retries. A caller that wants another attempt builds a new
//! manager; against a table that is already valid the pass only reads.
//!
//! # Concurrency
//! Two managers that both observe "absent" both run the create script. Creation
//! races are left to the script (`CREATE TABLE IF NOT EXISTS`) or to an external
//! advisory lock.

use crate::adapters::{ConnectionHandle, CreateScriptProvider, HeaderNormalizer};
use crate::dialect::{ColumnTypes, DialectExecutor};
use crate::error::{Result, TableError};
use crate::models::{KeySet, TableIdentity};
use crate::validation::SchemaValidator;

/// Where a table is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableState {
    /// Nothing issued yet
    Unchecked,
    /// Table was absent; create script running
    Creating,
    /// Comparing live headers with the declared keys
    Validating,
    /// Validated; data access allowed
    Ready,
    /// Terminal failure with the reason that ended the lifecycle
    Failed(String),
    /// Connection released after use
    Closed,
}

impl TableState {
    /// Only `Ready` allows data access.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl std::fmt::Display for TableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchecked => write!(f, "unchecked"),
            Self::Creating => write!(f, "creating"),
            Self::Validating => write!(f, "validating"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// What a lifecycle pass did to reach Ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifecycleReport {
    /// The table was absent and the create script ran
    pub created: bool,
    /// Statements executed from the create script
    pub statements_executed: usize,
    /// Columns observed on the live table
    pub columns: usize,
}

/// Drives one table from Unchecked to Ready and owns its connection.
///
/// The connection is closed when the lifecycle fails, when [`close`] is
/// called, or at the latest when the manager is dropped.
///
/// [`close`]: TableLifecycleManager::close
pub struct TableLifecycleManager {
    executor: DialectExecutor,
    keys: KeySet,
    connection: Option<Box<dyn ConnectionHandle>>,
    state: TableState,
    column_types: ColumnTypes,
}

impl std::fmt::Debug for TableLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableLifecycleManager")
            .field("table", self.executor.table())
            .field("dialect", self.executor.dialect())
            .field("state", &self.state)
            .field("connected", &self.connection.is_some())
            .finish_non_exhaustive()
    }
}

impl TableLifecycleManager {
    /// Manager in the `Unchecked` state, owning `connection`.
    pub fn new(
        executor: DialectExecutor,
        keys: KeySet,
        connection: Box<dyn ConnectionHandle>,
    ) -> Self {
        Self {
            executor,
            keys,
            connection: Some(connection),
            state: TableState::Unchecked,
            column_types: ColumnTypes::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &TableState {
        &self.state
    }

    /// Table this lifecycle manages.
    pub fn table(&self) -> &TableIdentity {
        self.executor.table()
    }

    /// Executor used for every statement of this table.
    pub fn executor(&self) -> &DialectExecutor {
        &self.executor
    }

    /// Column types captured during validation.
    pub fn column_types(&self) -> &ColumnTypes {
        &self.column_types
    }

    /// Runs the lifecycle once.
    ///
    /// On failure the state becomes `Failed`, the connection is closed and
    /// the error is returned unchanged.
    ///
    /// # Errors
    /// - `UnsupportedDialect` or `QueryExecution` from the existence check
    /// - `AmbiguousTableDefinition` when more than one definition matches
    /// - `CreateTable` when the script cannot be obtained or executed
    /// - `QueryExecution` from header introspection
    /// - `MismatchedHeaders` when the live columns differ from the keys
    /// - `NotReady` when the lifecycle has already run
    pub async fn run(
        &mut self,
        scripts: &dyn CreateScriptProvider,
        normalizer: &dyn HeaderNormalizer,
    ) -> Result<LifecycleReport> {
        if self.state != TableState::Unchecked {
            return Err(TableError::NotReady {
                table: self.table().clone(),
                state: self.state.clone(),
            });
        }

        match self.drive(scripts, normalizer).await {
            Ok(report) => {
                self.state = TableState::Ready;
                tracing::info!(
                    "{}: table ready ({} columns{})",
                    self.table(),
                    report.columns,
                    if report.created { ", created" } else { "" }
                );
                Ok(report)
            }
            Err(error) => {
                tracing::error!("{}: lifecycle failed: {}", self.table(), error);
                self.state = TableState::Failed(error.to_string());
                self.release().await;
                Err(error)
            }
        }
    }

    async fn drive(
        &mut self,
        scripts: &dyn CreateScriptProvider,
        normalizer: &dyn HeaderNormalizer,
    ) -> Result<LifecycleReport> {
        let table = self.executor.table().clone();
        let connection = self
            .connection
            .as_deref_mut()
            .ok_or_else(|| TableError::NotReady {
                table: table.clone(),
                state: self.state.clone(),
            })?;

        let mut report = LifecycleReport::default();

        let matches = self.executor.existence_check(connection).await?;
        match matches {
            0 => {
                tracing::info!("{}: table not found, creating", table);
                self.state = TableState::Creating;

                let script = scripts.create_script(&table).await.map_err(|e| {
                    TableError::create_failed(&table, "create script unavailable", e)
                })?;
                report.statements_executed = self
                    .executor
                    .execute_script(connection, &script)
                    .await
                    .map_err(|e| TableError::create_failed(&table, "create script failed", e))?;
                report.created = true;

                tracing::info!(
                    "{}: created ({} statements)",
                    table,
                    report.statements_executed
                );
            }
            1 => tracing::debug!("{}: table exists", table),
            matches => {
                return Err(TableError::AmbiguousTableDefinition { table, matches });
            }
        }

        self.state = TableState::Validating;
        let rows = self.executor.fetch_headers(connection).await?;
        let dialect = self.executor.dialect();
        let observed = normalizer.normalize(dialect, &rows);
        tracing::debug!("{}: observed headers {:?}", table, observed);

        SchemaValidator
            .validate(&observed, &self.keys)
            .map_err(|mismatch| TableError::MismatchedHeaders {
                table: table.clone(),
                missing: mismatch.missing,
                unexpected: mismatch.unexpected,
            })?;

        self.column_types = normalizer.column_types(dialect, &rows);
        report.columns = observed.len();
        Ok(report)
    }

    /// The connection, available only in the Ready state.
    ///
    /// # Errors
    /// `NotReady` in any other state.
    pub fn connection(&mut self) -> Result<&mut dyn ConnectionHandle> {
        match (&self.state, self.connection.as_deref_mut()) {
            (TableState::Ready, Some(connection)) => Ok(connection),
            (state, _) => Err(TableError::NotReady {
                table: self.executor.table().clone(),
                state: state.clone(),
            }),
        }
    }

    /// Closes the connection gracefully. Data access fails afterwards.
    ///
    /// # Errors
    /// `QueryExecution` if the backend reports an error while closing; the
    /// connection is released regardless.
    pub async fn close(&mut self) -> Result<()> {
        let result = match self.connection.take() {
            Some(mut connection) => connection.close().await.map_err(|e| {
                TableError::query_failed(self.executor.table(), "closing connection", e)
            }),
            None => Ok(()),
        };
        if !matches!(self.state, TableState::Failed(_)) {
            self.state = TableState::Closed;
        }
        tracing::debug!("{}: connection closed", self.executor.table());
        result
    }

    /// Closes the connection on a failure path, logging rather than
    /// propagating close errors so the original failure is kept.
    async fn release(&mut self) {
        if let Some(mut connection) = self.connection.take()
            && let Err(e) = connection.close().await
        {
            tracing::warn!(
                "{}: error while releasing connection: {}",
                self.executor.table(),
                e
            );
        }
    }
}

impl Drop for TableLifecycleManager {
    fn drop(&mut self) {
        if self.connection.take().is_some() {
            tracing::debug!(
                "{}: releasing connection on drop",
                self.executor.table()
            );
        }
    }
}
