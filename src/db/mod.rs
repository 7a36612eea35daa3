//! Database abstraction layer.
//!
//! This module provides:
//! - The `Connection` capability and one implementation per backend
//! - The transaction manager state machine and its factory
//! - Named placeholder compilation and statement classification
//! - Driver row decoding into the uniform row shape

#[macro_use]
pub mod macros;
pub mod connection;
pub mod document;
pub mod mysql;
pub mod named;
pub(crate) mod params;
pub mod sqlite;
pub mod statement;
pub mod transaction;
pub mod types;

pub use connection::{Connection, ConnectionFactory, DbConnection};
pub use document::{DocumentClient, DocumentConnection, DocumentTransactionManager};
pub use mysql::{MySqlConnection, MySqlTransactionManager};
pub use sqlite::{SqliteConnection, SqliteTransactionManager};
pub use transaction::{
    Executor, TransactionManager, TransactionManagerFactory, TxState, generate_transaction_id,
    settle,
};

use crate::error::{DbError, DbResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Run `fut`, failing with [`DbError::Timeout`] once `deadline` elapses.
pub(crate) async fn with_deadline<T, F>(operation: &str, deadline: Duration, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(DbError::timeout(operation, deadline.as_secs())),
    }
}

/// Translate a driver error raised while `operation` waited up to `deadline`
/// for the connection handle.
///
/// The pool's acquire timeout is the statement deadline, so a timed-out
/// acquire is reported against that deadline.
pub(crate) fn driver_error(err: sqlx::Error, operation: &str, deadline: Duration) -> DbError {
    match err {
        sqlx::Error::PoolTimedOut => DbError::timeout(
            format!("{} (waiting for the connection handle)", operation),
            deadline.as_secs(),
        ),
        other => DbError::from(other),
    }
}
