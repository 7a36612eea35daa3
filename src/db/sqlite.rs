//! Embedded SQL backend (SQLite).
//!
//! The handle is a single-connection sqlx pool over the database file, created
//! on first `connect()`. `begin()` only marks the manager Active; the native
//! transaction is opened by the first statement issued while Active, so a
//! `begin(); commit()` pair never touches the file.

use crate::config::Deadlines;
use crate::db::connection::{Connection, connection_suggestion};
use crate::db::named::{self, CompiledStatement};
use crate::db::params::bind_sqlite_value;
use crate::db::statement::{self, StatementKind};
use crate::db::transaction::{Executor, TransactionManager, TxState, generate_transaction_id};
use crate::db::types::RowToValues;
use crate::db::{driver_error, with_deadline};
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, ConnectionInfo, Params, Row};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const MEMORY_PATH: &str = ":memory:";

/// Connection to a SQLite database file.
pub struct SqliteConnection {
    path: String,
    deadlines: Deadlines,
    pool: Mutex<Option<SqlitePool>>,
}

impl SqliteConnection {
    pub fn new(path: impl Into<String>, deadlines: Deadlines) -> Self {
        Self {
            path: path.into(),
            deadlines,
            pool: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn deadlines(&self) -> Deadlines {
        self.deadlines
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        if self.path == MEMORY_PATH {
            return SqliteConnectOptions::from_str("sqlite::memory:").map_err(DbError::from);
        }
        Ok(SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true))
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    type Handle = SqlitePool;

    fn kind(&self) -> BackendKind {
        BackendKind::EmbeddedSql
    }

    async fn connect(&self) -> DbResult<SqlitePool> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let options = self.connect_options()?;
        // One connection, never recycled: an in-memory database lives exactly
        // as long as its connection.
        let pool = with_deadline("connect", self.deadlines.connect, async {
            SqlitePoolOptions::new()
                .min_connections(0)
                .max_connections(1)
                .acquire_timeout(self.deadlines.statement)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
                .map_err(|e| {
                    DbError::connection(
                        format!("Failed to open SQLite database '{}': {}", self.path, e),
                        connection_suggestion(BackendKind::EmbeddedSql, &e),
                    )
                })
        })
        .await?;

        info!(backend = "sqlite", path = %self.path, "Connected");
        *guard = Some(pool.clone());
        Ok(pool)
    }

    async fn disconnect(&self) -> DbResult<()> {
        let pool = self.pool.lock().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            info!(backend = "sqlite", path = %self.path, "Disconnected");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.pool.lock().await.is_some()
    }

    async fn describe(&self) -> ConnectionInfo {
        ConnectionInfo {
            backend: BackendKind::EmbeddedSql,
            locator: self.path.clone(),
            credentials_path: None,
            connected: self.is_connected().await,
        }
    }
}

/// Transaction manager for SQLite.
pub struct SqliteTransactionManager {
    id: String,
    connection: Arc<SqliteConnection>,
    state: TxState,
    /// Opened lazily by the first statement while Active.
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteTransactionManager {
    pub fn new(connection: Arc<SqliteConnection>) -> Self {
        Self {
            id: generate_transaction_id(),
            connection,
            state: TxState::Idle,
            tx: None,
        }
    }

    /// Whether a native transaction has been opened since `begin()`.
    pub fn has_native_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

#[async_trait]
impl Executor for SqliteTransactionManager {
    fn backend(&self) -> BackendKind {
        BackendKind::EmbeddedSql
    }

    async fn execute(&mut self, statement: &str, params: &Params) -> DbResult<Vec<Row>> {
        let compiled = named::compile(statement, params, BackendKind::EmbeddedSql)?;
        let kind = statement::classify(&compiled.sql, BackendKind::EmbeddedSql);
        let deadline = self.connection.deadlines().statement;
        let pool = self.connection.connect().await?;

        debug!(
            transaction_id = %self.id,
            backend = "sqlite",
            sql = %compiled.sql,
            params = compiled.values.len(),
            active = self.state.is_active(),
            "Executing statement"
        );

        let rows = if self.state.is_active() {
            if self.tx.is_none() {
                let tx = with_deadline("begin", deadline, async {
                    pool.begin().await.map_err(|e| driver_error(e, "begin", deadline))
                })
                .await?;
                debug!(transaction_id = %self.id, "Native transaction opened");
                self.tx = Some(tx);
            }
            let Some(tx) = self.tx.as_mut() else {
                return Err(DbError::internal("SQLite transaction missing while active"));
            };
            with_deadline("execute", deadline, run(&mut **tx, &compiled, kind, deadline)).await?
        } else {
            with_deadline("execute", deadline, run(&pool, &compiled, kind, deadline)).await?
        };

        if let Some(affected) = rows.first().and_then(Row::affected_count) {
            debug!(transaction_id = %self.id, rows_affected = affected, "Statement applied");
        }
        Ok(rows)
    }
}

#[async_trait]
impl TransactionManager for SqliteTransactionManager {
    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> TxState {
        self.state
    }

    async fn begin(&mut self) -> DbResult<()> {
        if self.state.is_active() {
            return Err(DbError::transaction("Transaction already active", &self.id));
        }
        self.connection.connect().await?;
        self.state = TxState::Active;
        info!(transaction_id = %self.id, backend = "sqlite", "Transaction started");
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        if !self.state.is_active() {
            debug!(transaction_id = %self.id, "Commit while idle; nothing to do");
            return Ok(());
        }
        self.state = TxState::Idle;
        if let Some(tx) = self.tx.take() {
            let deadline = self.connection.deadlines().statement;
            with_deadline("commit", deadline, async {
                tx.commit().await.map_err(DbError::from)
            })
            .await?;
        }
        info!(transaction_id = %self.id, backend = "sqlite", "Transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        if !self.state.is_active() {
            debug!(transaction_id = %self.id, "Rollback while idle; nothing to do");
            return Ok(());
        }
        self.state = TxState::Idle;
        if let Some(tx) = self.tx.take() {
            let deadline = self.connection.deadlines().statement;
            with_deadline("rollback", deadline, async {
                tx.rollback().await.map_err(DbError::from)
            })
            .await?;
        }
        info!(transaction_id = %self.id, backend = "sqlite", "Transaction rolled back");
        Ok(())
    }
}

async fn run<'c, E>(
    executor: E,
    compiled: &CompiledStatement,
    kind: StatementKind,
    deadline: Duration,
) -> DbResult<Vec<Row>>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let query = compiled
        .values
        .iter()
        .fold(sqlx::query(&compiled.sql), bind_sqlite_value);
    match kind {
        StatementKind::Read => {
            let rows: Vec<SqliteRow> = query
                .fetch(executor)
                .try_collect()
                .await
                .map_err(|e| driver_error(e, "execute", deadline))?;
            rows.iter().map(RowToValues::to_row).collect()
        }
        StatementKind::Mutation => {
            let result = query
                .execute(executor)
                .await
                .map_err(|e| driver_error(e, "execute", deadline))?;
            Ok(vec![Row::affected_rows(result.rows_affected())])
        }
    }
}
