//! Connection-related data models.
//!
//! This module defines the backend kinds, the tagged connection configuration
//! and the non-secret connection description used for diagnostics.

use crate::error::DbError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported persistence backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Embedded SQL file (SQLite)
    #[serde(rename = "sqlite")]
    EmbeddedSql,
    /// Client-server SQL engine (MySQL, includes MariaDB)
    #[serde(rename = "mysql")]
    ClientServerSql,
    /// Schemaless document store (Firestore)
    #[serde(rename = "firestore")]
    DocumentStore,
}

impl BackendKind {
    /// Value accepted in `DB_TYPE` for this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmbeddedSql => "sqlite",
            Self::ClientServerSql => "mysql",
            Self::DocumentStore => "firestore",
        }
    }

    /// Get the display name for this backend.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::EmbeddedSql => "SQLite",
            Self::ClientServerSql => "MySQL",
            Self::DocumentStore => "Firestore",
        }
    }

    /// Whether statements can be executed against this backend.
    pub fn supports_sql(&self) -> bool {
        !matches!(self, Self::DocumentStore)
    }

    /// Whether rollback reverts statements issued since begin.
    pub fn is_atomic(&self) -> bool {
        !matches!(self, Self::DocumentStore)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for BackendKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::EmbeddedSql),
            "mysql" | "mariadb" => Ok(Self::ClientServerSql),
            "firestore" => Ok(Self::DocumentStore),
            other => Err(DbError::config(format!(
                "Unsupported database type: '{}'. Expected one of: sqlite, mysql, firestore",
                other
            ))),
        }
    }
}

/// Resolved connection configuration, one variant per backend.
///
/// Built once per configuration load by [`crate::config::DatabaseArgs::resolve`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "db_type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    #[serde(rename = "sqlite")]
    EmbeddedSql { path: String },
    #[serde(rename = "mysql")]
    ClientServerSql {
        host: String,
        port: u16,
        user: String,
        /// Contains sensitive data - never log
        #[serde(skip_serializing, default)]
        password: String,
        database: String,
    },
    #[serde(rename = "firestore")]
    DocumentStore {
        project_id: String,
        credentials_path: Option<String>,
    },
}

impl ConnectionConfig {
    /// Get the backend kind of this configuration.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::EmbeddedSql { .. } => BackendKind::EmbeddedSql,
            Self::ClientServerSql { .. } => BackendKind::ClientServerSql,
            Self::DocumentStore { .. } => BackendKind::DocumentStore,
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmbeddedSql { path } => {
                f.debug_struct("EmbeddedSql").field("path", path).finish()
            }
            Self::ClientServerSql {
                host,
                port,
                user,
                database,
                ..
            } => f
                .debug_struct("ClientServerSql")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("password", &"****")
                .field("database", database)
                .finish(),
            Self::DocumentStore {
                project_id,
                credentials_path,
            } => f
                .debug_struct("DocumentStore")
                .field("project_id", project_id)
                .field("credentials_path", credentials_path)
                .finish(),
        }
    }
}

/// Non-secret description of a connection, for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub backend: BackendKind,
    /// File path, `mysql://user@host:port/database`, or `firestore://project`
    pub locator: String,
    /// Path of the credential file, never its contents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<String>,
    pub connected: bool,
}
