//! Configuration handling for item-store.
//!
//! This module provides configuration management via CLI arguments and environment
//! variables. Database settings resolve into a tagged [`ConnectionConfig`]; resolution
//! is pure and synchronous and never touches the network.

use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, ConnectionConfig};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

pub const ENV_DB_TYPE: &str = "DB_TYPE";
pub const ENV_SQLITE_DB_PATH: &str = "SQLITE_DB_PATH";
pub const ENV_MYSQL_HOST: &str = "MYSQL_HOST";
pub const ENV_MYSQL_PORT: &str = "MYSQL_PORT";
pub const ENV_MYSQL_USER: &str = "MYSQL_USER";
pub const ENV_MYSQL_PASSWORD: &str = "MYSQL_PASSWORD";
pub const ENV_MYSQL_DATABASE: &str = "MYSQL_DATABASE";
pub const ENV_FIRESTORE_PROJECT_ID: &str = "FIRESTORE_PROJECT_ID";
pub const ENV_FIRESTORE_CREDENTIALS_PATH: &str = "FIRESTORE_CREDENTIALS_PATH";
pub const ENV_CONNECT_TIMEOUT: &str = "DB_CONNECT_TIMEOUT";
pub const ENV_STATEMENT_TIMEOUT: &str = "DB_STATEMENT_TIMEOUT";

pub const DEFAULT_DB_TYPE: BackendKind = BackendKind::EmbeddedSql;
pub const DEFAULT_SQLITE_PATH: &str = "db.sqlite3";
pub const DEFAULT_MYSQL_HOST: &str = "localhost";
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_MYSQL_USER: &str = "root";
pub const DEFAULT_MYSQL_PASSWORD: &str = "";
pub const DEFAULT_MYSQL_DATABASE: &str = "test";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Upper bounds applied to connect and to execute/commit/rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub connect: Duration,
    pub statement: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            statement: Duration::from_secs(DEFAULT_STATEMENT_TIMEOUT_SECS),
        }
    }
}

/// Database settings, sourced from flags or the environment.
///
/// Every field is optional here; defaults are applied per backend in
/// [`DatabaseArgs::resolve`], so a value that only matters to another
/// backend is simply ignored.
#[derive(Clone, Args)]
pub struct DatabaseArgs {
    /// Backend kind: sqlite, mysql or firestore (default: sqlite)
    #[arg(long = "db-type", env = ENV_DB_TYPE)]
    pub db_type: Option<String>,

    /// SQLite database file (default: db.sqlite3)
    #[arg(long, env = ENV_SQLITE_DB_PATH)]
    pub sqlite_path: Option<String>,

    /// MySQL host (default: localhost)
    #[arg(long, env = ENV_MYSQL_HOST)]
    pub mysql_host: Option<String>,

    /// MySQL port (default: 3306)
    #[arg(long, env = ENV_MYSQL_PORT)]
    pub mysql_port: Option<String>,

    /// MySQL user (default: root)
    #[arg(long, env = ENV_MYSQL_USER)]
    pub mysql_user: Option<String>,

    /// MySQL password (default: empty)
    #[arg(long, env = ENV_MYSQL_PASSWORD, hide_env_values = true)]
    pub mysql_password: Option<String>,

    /// MySQL database name (default: test)
    #[arg(long, env = ENV_MYSQL_DATABASE)]
    pub mysql_database: Option<String>,

    /// Firestore project id (required for firestore)
    #[arg(long, env = ENV_FIRESTORE_PROJECT_ID)]
    pub firestore_project_id: Option<String>,

    /// Service account JSON file; ambient credentials are used when absent
    #[arg(long, env = ENV_FIRESTORE_CREDENTIALS_PATH)]
    pub firestore_credentials_path: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = ENV_CONNECT_TIMEOUT)]
    pub connect_timeout: u64,

    /// Statement, commit and rollback timeout in seconds
    #[arg(long, default_value_t = DEFAULT_STATEMENT_TIMEOUT_SECS, env = ENV_STATEMENT_TIMEOUT)]
    pub statement_timeout: u64,
}

impl Default for DatabaseArgs {
    fn default() -> Self {
        Self {
            db_type: None,
            sqlite_path: None,
            mysql_host: None,
            mysql_port: None,
            mysql_user: None,
            mysql_password: None,
            mysql_database: None,
            firestore_project_id: None,
            firestore_credentials_path: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for DatabaseArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseArgs")
            .field("db_type", &self.db_type)
            .field("sqlite_path", &self.sqlite_path)
            .field("mysql_host", &self.mysql_host)
            .field("mysql_port", &self.mysql_port)
            .field("mysql_user", &self.mysql_user)
            .field("mysql_password", &self.mysql_password.as_ref().map(|_| "****"))
            .field("mysql_database", &self.mysql_database)
            .field("firestore_project_id", &self.firestore_project_id)
            .field("firestore_credentials_path", &self.firestore_credentials_path)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

impl DatabaseArgs {
    /// Read database settings from the process environment.
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read database settings through an arbitrary key lookup.
    ///
    /// Keys are the environment variable names (`DB_TYPE`, `MYSQL_HOST`, ...).
    pub fn from_lookup<F>(lookup: F) -> DbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            db_type: lookup(ENV_DB_TYPE),
            sqlite_path: lookup(ENV_SQLITE_DB_PATH),
            mysql_host: lookup(ENV_MYSQL_HOST),
            mysql_port: lookup(ENV_MYSQL_PORT),
            mysql_user: lookup(ENV_MYSQL_USER),
            mysql_password: lookup(ENV_MYSQL_PASSWORD),
            mysql_database: lookup(ENV_MYSQL_DATABASE),
            firestore_project_id: lookup(ENV_FIRESTORE_PROJECT_ID),
            firestore_credentials_path: lookup(ENV_FIRESTORE_CREDENTIALS_PATH),
            connect_timeout: parse_secs(lookup(ENV_CONNECT_TIMEOUT), ENV_CONNECT_TIMEOUT)?
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            statement_timeout: parse_secs(lookup(ENV_STATEMENT_TIMEOUT), ENV_STATEMENT_TIMEOUT)?
                .unwrap_or(DEFAULT_STATEMENT_TIMEOUT_SECS),
        })
    }

    /// Get the backend kind, defaulting to sqlite when unset.
    pub fn backend_kind(&self) -> DbResult<BackendKind> {
        match self.db_type.as_deref() {
            None => Ok(DEFAULT_DB_TYPE),
            Some(s) => s.parse(),
        }
    }

    /// Resolve the tagged connection configuration.
    ///
    /// Fails with [`DbError::Config`] when the backend kind is unknown, the
    /// Firestore project id is missing, or the MySQL port is not a number.
    pub fn resolve(&self) -> DbResult<ConnectionConfig> {
        match self.backend_kind()? {
            BackendKind::EmbeddedSql => Ok(ConnectionConfig::EmbeddedSql {
                path: non_empty(&self.sqlite_path)
                    .unwrap_or(DEFAULT_SQLITE_PATH)
                    .to_string(),
            }),
            BackendKind::ClientServerSql => {
                let port = match non_empty(&self.mysql_port) {
                    Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                        DbError::config(format!(
                            "{} must be a port number, got '{}': {}",
                            ENV_MYSQL_PORT, raw, e
                        ))
                    })?,
                    None => DEFAULT_MYSQL_PORT,
                };
                Ok(ConnectionConfig::ClientServerSql {
                    host: non_empty(&self.mysql_host)
                        .unwrap_or(DEFAULT_MYSQL_HOST)
                        .to_string(),
                    port,
                    user: non_empty(&self.mysql_user)
                        .unwrap_or(DEFAULT_MYSQL_USER)
                        .to_string(),
                    // An explicitly empty password is a valid password.
                    password: self
                        .mysql_password
                        .clone()
                        .unwrap_or_else(|| DEFAULT_MYSQL_PASSWORD.to_string()),
                    database: non_empty(&self.mysql_database)
                        .unwrap_or(DEFAULT_MYSQL_DATABASE)
                        .to_string(),
                })
            }
            BackendKind::DocumentStore => {
                let project_id = non_empty(&self.firestore_project_id).ok_or_else(|| {
                    DbError::config(format!(
                        "{} must be set when {}=firestore",
                        ENV_FIRESTORE_PROJECT_ID, ENV_DB_TYPE
                    ))
                })?;
                Ok(ConnectionConfig::DocumentStore {
                    project_id: project_id.trim().to_string(),
                    credentials_path: non_empty(&self.firestore_credentials_path)
                        .map(String::from),
                })
            }
        }
    }

    /// Get the configured deadlines.
    pub fn deadlines(&self) -> DbResult<Deadlines> {
        if self.connect_timeout == 0 || self.statement_timeout == 0 {
            return Err(DbError::config("Timeouts must be greater than 0 seconds"));
        }
        Ok(Deadlines {
            connect: Duration::from_secs(self.connect_timeout),
            statement: Duration::from_secs(self.statement_timeout),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn parse_secs(value: Option<String>, key: &str) -> DbResult<Option<u64>> {
    value
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim().parse::<u64>().map_err(|e| {
                DbError::config(format!("{} must be a number of seconds, got '{}': {}", key, s, e))
            })
        })
        .transpose()
}

/// Item operation to run.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Create the item table if it does not exist
    Init,
    /// List all items
    List,
    /// Show one item
    Get { id: i64 },
    /// Create an item
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: f64,
    },
    /// Replace the name and price of an item
    Update {
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: f64,
    },
    /// Delete an item
    Delete { id: i64 },
    /// Print the non-secret connection description
    Describe,
}

/// Configuration for the item-store CLI.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "item-store",
    about = "Item CRUD over SQLite, MySQL or Firestore with a uniform transaction contract",
    version,
    author
)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "LOG_JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}
