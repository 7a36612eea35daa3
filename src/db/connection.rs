//! Connection capability and factory.
//!
//! A [`Connection`] owns one lazily created native handle. `connect()` is
//! idempotent and returns the memoized handle; `disconnect()` releases it and
//! is a no-op when nothing is open. [`DbConnection`] is the tagged union the
//! rest of the crate passes around; [`ConnectionFactory`] builds it from a
//! resolved [`ConnectionConfig`] without any I/O.

use crate::config::Deadlines;
use crate::db::document::DocumentConnection;
use crate::db::mysql::MySqlConnection;
use crate::db::sqlite::SqliteConnection;
use crate::error::DbResult;
use crate::impl_connection_dispatch;
use crate::models::{BackendKind, ConnectionConfig, ConnectionInfo};
use async_trait::async_trait;
use std::sync::Arc;

/// Lifecycle of one native handle.
#[async_trait]
pub trait Connection: Send + Sync {
    /// The memoized native handle; cheap to clone.
    type Handle: Clone + Send + Sync;

    fn kind(&self) -> BackendKind;

    /// Establish the handle if absent and return it.
    async fn connect(&self) -> DbResult<Self::Handle>;

    /// Release the handle, waiting for the backend to finish closing.
    async fn disconnect(&self) -> DbResult<()>;

    async fn is_connected(&self) -> bool;

    /// Non-secret metadata for diagnostics.
    async fn describe(&self) -> ConnectionInfo;
}

/// A connection to one of the supported backends.
#[derive(Debug, Clone)]
pub enum DbConnection {
    Sqlite(Arc<SqliteConnection>),
    MySql(Arc<MySqlConnection>),
    DocumentStore(Arc<DocumentConnection>),
}

impl DbConnection {
    pub fn kind(&self) -> BackendKind {
        impl_connection_dispatch!(self, {
            Sqlite(c) => c.kind(),
            MySql(c) => c.kind(),
            DocumentStore(c) => c.kind(),
        })
    }

    /// Connect without exposing the backend-specific handle.
    pub async fn connect(&self) -> DbResult<()> {
        impl_connection_dispatch!(self, {
            Sqlite(c) => c.connect().await.map(drop),
            MySql(c) => c.connect().await.map(drop),
            DocumentStore(c) => c.connect().await.map(drop),
        })
    }

    pub async fn disconnect(&self) -> DbResult<()> {
        impl_connection_dispatch!(self, {
            Sqlite(c) => c.disconnect().await,
            MySql(c) => c.disconnect().await,
            DocumentStore(c) => c.disconnect().await,
        })
    }

    pub async fn is_connected(&self) -> bool {
        impl_connection_dispatch!(self, {
            Sqlite(c) => c.is_connected().await,
            MySql(c) => c.is_connected().await,
            DocumentStore(c) => c.is_connected().await,
        })
    }

    pub async fn describe(&self) -> ConnectionInfo {
        impl_connection_dispatch!(self, {
            Sqlite(c) => c.describe().await,
            MySql(c) => c.describe().await,
            DocumentStore(c) => c.describe().await,
        })
    }
}

/// Maps a resolved configuration to a concrete connection.
pub struct ConnectionFactory;

impl ConnectionFactory {
    /// Build the connection for `config`. Does not connect.
    pub fn create(config: &ConnectionConfig, deadlines: Deadlines) -> DbConnection {
        match config {
            ConnectionConfig::EmbeddedSql { path } => {
                DbConnection::Sqlite(Arc::new(SqliteConnection::new(path.clone(), deadlines)))
            }
            ConnectionConfig::ClientServerSql {
                host,
                port,
                user,
                password,
                database,
            } => DbConnection::MySql(Arc::new(MySqlConnection::new(
                host.clone(),
                *port,
                user.clone(),
                password.clone(),
                database.clone(),
                deadlines,
            ))),
            ConnectionConfig::DocumentStore {
                project_id,
                credentials_path,
            } => DbConnection::DocumentStore(Arc::new(DocumentConnection::new(
                project_id.clone(),
                credentials_path.clone(),
                deadlines,
            ))),
        }
    }
}

/// Generate a helpful suggestion for connection errors.
pub(crate) fn connection_suggestion(kind: BackendKind, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", kind);
    }

    if error_str.contains("access denied") || error_str.contains("password") {
        return "Verify MYSQL_USER and MYSQL_PASSWORD".to_string();
    }

    if error_str.contains("unknown database") {
        return "Check that the database named by MYSQL_DATABASE exists".to_string();
    }

    if error_str.contains("unable to open") || error_str.contains("permission denied") {
        return "Check that the directory of SQLITE_DB_PATH exists and is writable".to_string();
    }

    match kind {
        BackendKind::EmbeddedSql => "Verify SQLITE_DB_PATH points to an accessible file".to_string(),
        BackendKind::ClientServerSql => {
            "Verify MYSQL_HOST, MYSQL_PORT and network reachability".to_string()
        }
        BackendKind::DocumentStore => {
            "Verify FIRESTORE_PROJECT_ID and FIRESTORE_CREDENTIALS_PATH".to_string()
        }
    }
}
