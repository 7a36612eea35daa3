//! Transaction manager contract, factory and orchestration.
//!
//! Every backend implements the same two-state machine:
//!
//! ```text
//!   Idle --begin()--> Active --commit()/rollback()--> Idle
//! ```
//!
//! `execute()` works in both states. While Idle each statement autocommits;
//! while Active it runs inside the open transaction and becomes durable only
//! on `commit()`. `commit()` and `rollback()` are no-ops when Idle, and
//! `begin()` while Active is rejected.
//!
//! A manager borrows its connection (it never closes it) and takes `&mut self`
//! everywhere, so one instance serves exactly one caller at a time.

use crate::db::connection::DbConnection;
use crate::db::document::DocumentTransactionManager;
use crate::db::mysql::MySqlTransactionManager;
use crate::db::sqlite::SqliteTransactionManager;
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, ConnectionConfig, Params, Row};
use async_trait::async_trait;
use tracing::warn;

/// State of a transaction manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    #[default]
    Idle,
    Active,
}

impl TxState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Statement execution, the only database access repositories get.
#[async_trait]
pub trait Executor: Send {
    fn backend(&self) -> BackendKind;

    /// Execute one statement with `:name` placeholders bound from `params`.
    ///
    /// Read statements return every matching row; anything else returns a
    /// single `{affected_rows: N}` row.
    async fn execute(&mut self, statement: &str, params: &Params) -> DbResult<Vec<Row>>;

    /// Execute a statement that has no placeholders.
    async fn run(&mut self, statement: &str) -> DbResult<Vec<Row>> {
        let params = Params::new();
        self.execute(statement, &params).await
    }
}

/// Begin/commit/rollback over one connection.
#[async_trait]
pub trait TransactionManager: Executor {
    /// Identifier used in log fields and transaction errors.
    fn id(&self) -> &str;

    fn state(&self) -> TxState;

    fn is_active(&self) -> bool {
        self.state().is_active()
    }

    async fn begin(&mut self) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;
}

/// Maps a connection and its configuration to a transaction manager.
pub struct TransactionManagerFactory;

impl TransactionManagerFactory {
    /// Create a fresh manager in the Idle state.
    ///
    /// Fails with [`DbError::Config`] when the connection was built for a
    /// different backend than `config` names.
    pub fn create_manager(
        connection: &DbConnection,
        config: &ConnectionConfig,
    ) -> DbResult<Box<dyn TransactionManager>> {
        if connection.kind() != config.kind() {
            return Err(DbError::config(format!(
                "Connection is {} but configuration selects {}",
                connection.kind(),
                config.kind()
            )));
        }
        let manager: Box<dyn TransactionManager> = match connection {
            DbConnection::Sqlite(c) => Box::new(SqliteTransactionManager::new(c.clone())),
            DbConnection::MySql(c) => Box::new(MySqlTransactionManager::new(c.clone())),
            DbConnection::DocumentStore(c) => Box::new(DocumentTransactionManager::new(c.clone())),
        };
        Ok(manager)
    }
}

/// Finish a unit of work begun on `tm`.
///
/// On success the transaction is committed; if the commit fails, a rollback
/// is attempted and the commit error returned. On failure the transaction is
/// rolled back and the original error returned unchanged. A rollback error
/// never replaces the error being reported; it is logged instead.
pub async fn settle<T, M>(tm: &mut M, outcome: DbResult<T>) -> DbResult<T>
where
    M: TransactionManager + ?Sized,
{
    match outcome {
        Ok(value) => match tm.commit().await {
            Ok(()) => Ok(value),
            Err(commit_err) => {
                if let Err(rollback_err) = tm.rollback().await {
                    warn!(
                        transaction_id = %tm.id(),
                        error = %rollback_err,
                        "Rollback after failed commit also failed"
                    );
                }
                Err(commit_err)
            }
        },
        Err(err) => {
            if let Err(rollback_err) = tm.rollback().await {
                warn!(
                    transaction_id = %tm.id(),
                    error = %rollback_err,
                    original_error = %err,
                    "Rollback failed"
                );
            }
            Err(err)
        }
    }
}

/// Generate a unique transaction ID.
pub fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}
