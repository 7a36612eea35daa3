//! Client-server SQL backend (MySQL, MariaDB).
//!
//! The handle is a single-connection sqlx pool opened with the configured
//! credentials. Unlike SQLite, `begin()` issues the native BEGIN right away.

use crate::config::Deadlines;
use crate::db::connection::{Connection, connection_suggestion};
use crate::db::named::{self, CompiledStatement};
use crate::db::params::bind_mysql_value;
use crate::db::statement::{self, StatementKind};
use crate::db::transaction::{Executor, TransactionManager, TxState, generate_transaction_id};
use crate::db::types::RowToValues;
use crate::db::{driver_error, with_deadline};
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, ConnectionInfo, Params, Row};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::{MySql, MySqlPool, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

/// Connection to a MySQL server.
pub struct MySqlConnection {
    host: String,
    port: u16,
    user: String,
    /// Contains sensitive data - never log
    password: String,
    database: String,
    deadlines: Deadlines,
    pool: Mutex<Option<MySqlPool>>,
}

impl MySqlConnection {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        deadlines: Deadlines,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            deadlines,
            pool: Mutex::new(None),
        }
    }

    pub fn deadlines(&self) -> Deadlines {
        self.deadlines
    }

    /// `mysql://user@host:port/database`, never including the password.
    pub fn locator(&self) -> String {
        let fallback = || {
            format!(
                "mysql://{}@{}:{}/{}",
                self.user, self.host, self.port, self.database
            )
        };
        let Ok(mut url) = Url::parse(&format!("mysql://{}", self.host)) else {
            return fallback();
        };
        if url.set_username(&self.user).is_err() || url.set_port(Some(self.port)).is_err() {
            return fallback();
        }
        url.set_path(&self.database);
        url.to_string()
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .charset("utf8mb4")
    }
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    type Handle = MySqlPool;

    fn kind(&self) -> BackendKind {
        BackendKind::ClientServerSql
    }

    async fn connect(&self) -> DbResult<MySqlPool> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let options = self.connect_options();
        let pool = with_deadline("connect", self.deadlines.connect, async {
            MySqlPoolOptions::new()
                .min_connections(0)
                .max_connections(1)
                .acquire_timeout(self.deadlines.statement)
                .connect_with(options)
                .await
                .map_err(|e| {
                    DbError::connection(
                        format!("Failed to connect to {}: {}", self.locator(), e),
                        connection_suggestion(BackendKind::ClientServerSql, &e),
                    )
                })
        })
        .await?;

        info!(backend = "mysql", locator = %self.locator(), "Connected");
        *guard = Some(pool.clone());
        Ok(pool)
    }

    async fn disconnect(&self) -> DbResult<()> {
        let pool = self.pool.lock().await.take();
        if let Some(pool) = pool {
            // Sends COM_QUIT and waits for the socket to close
            pool.close().await;
            info!(backend = "mysql", locator = %self.locator(), "Disconnected");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.pool.lock().await.is_some()
    }

    async fn describe(&self) -> ConnectionInfo {
        ConnectionInfo {
            backend: BackendKind::ClientServerSql,
            locator: self.locator(),
            credentials_path: None,
            connected: self.is_connected().await,
        }
    }
}

/// Transaction manager for MySQL.
pub struct MySqlTransactionManager {
    id: String,
    connection: Arc<MySqlConnection>,
    state: TxState,
    tx: Option<Transaction<'static, MySql>>,
}

impl MySqlTransactionManager {
    pub fn new(connection: Arc<MySqlConnection>) -> Self {
        Self {
            id: generate_transaction_id(),
            connection,
            state: TxState::Idle,
            tx: None,
        }
    }
}

#[async_trait]
impl Executor for MySqlTransactionManager {
    fn backend(&self) -> BackendKind {
        BackendKind::ClientServerSql
    }

    async fn execute(&mut self, statement: &str, params: &Params) -> DbResult<Vec<Row>> {
        let compiled = named::compile(statement, params, BackendKind::ClientServerSql)?;
        let kind = statement::classify(&compiled.sql, BackendKind::ClientServerSql);
        let deadline = self.connection.deadlines().statement;

        debug!(
            transaction_id = %self.id,
            backend = "mysql",
            sql = %compiled.sql,
            params = compiled.values.len(),
            active = self.state.is_active(),
            "Executing statement"
        );

        let rows = match self.tx.as_mut() {
            Some(tx) => with_deadline("execute", deadline, run(&mut **tx, &compiled, kind, deadline)).await?,
            None => {
                let pool = self.connection.connect().await?;
                with_deadline("execute", deadline, run(&pool, &compiled, kind, deadline)).await?
            }
        };

        if let Some(affected) = rows.first().and_then(Row::affected_count) {
            debug!(transaction_id = %self.id, rows_affected = affected, "Statement applied");
        }
        Ok(rows)
    }
}

#[async_trait]
impl TransactionManager for MySqlTransactionManager {
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
        let pool = self.connection.connect().await?;
        let deadline = self.connection.deadlines().statement;
        let tx = with_deadline("begin", deadline, async {
            pool.begin().await.map_err(|e| driver_error(e, "begin", deadline))
        })
        .await?;
        self.tx = Some(tx);
        self.state = TxState::Active;
        info!(transaction_id = %self.id, backend = "mysql", "Transaction started");
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        if !self.state.is_active() {
            debug!(transaction_id = %self.id, "Commit while idle; nothing to do");
            return Ok(());
        }
        self.state = TxState::Idle;
        let tx = self
            .tx
            .take()
            .ok_or_else(|| DbError::transaction("No open MySQL transaction", &self.id))?;
        let deadline = self.connection.deadlines().statement;
        with_deadline("commit", deadline, async {
            tx.commit().await.map_err(DbError::from)
        })
        .await?;
        info!(transaction_id = %self.id, backend = "mysql", "Transaction committed");
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
        info!(transaction_id = %self.id, backend = "mysql", "Transaction rolled back");
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
    E: sqlx::Executor<'c, Database = MySql>,
{
    let query = compiled
        .values
        .iter()
        .fold(sqlx::query(&compiled.sql), bind_mysql_value);
    match kind {
        StatementKind::Read => {
            let rows: Vec<MySqlRow> = query
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
