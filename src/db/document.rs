//! Document store backend (Firestore).
//!
//! The document store has no SQL surface and no atomic multi-statement
//! transactions reachable through this interface. The transaction manager
//! therefore only toggles its state, rollback reverts nothing, and every
//! `execute()` fails with [`DbError::UnsupportedOperation`].
//!
//! Connecting builds a [`DocumentClient`] from a service-account key file when
//! one is configured, otherwise from ambient credentials. No network traffic
//! happens until a request is made, and the client never keeps the private key.

use crate::config::Deadlines;
use crate::db::connection::Connection;
use crate::db::transaction::{Executor, TransactionManager, TxState, generate_transaction_id};
use crate::db::with_deadline;
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, ConnectionInfo, Params, Row};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Environment variable naming the application default credentials file.
pub const APPLICATION_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

/// Where the client's credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Key file named in the connection configuration
    ServiceAccount { path: String, client_email: String },
    /// Key file named by `GOOGLE_APPLICATION_CREDENTIALS`
    ApplicationDefault { path: String, client_email: String },
    /// Tokens fetched from the instance metadata server on first use
    MetadataServer,
}

/// Fields read from a service-account key file. The private key is only
/// checked for presence.
#[derive(Deserialize)]
struct ServiceAccountKey {
    #[serde(rename = "type")]
    key_type: String,
    client_email: String,
    project_id: Option<String>,
    private_key: Option<IgnoredAny>,
}

/// Client handle for one document-store project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentClient {
    project_id: String,
    credentials: CredentialSource,
}

impl DocumentClient {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn credentials(&self) -> &CredentialSource {
        &self.credentials
    }

    /// Resource name of the project's default database.
    pub fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }
}

/// Connection to a document-store project.
pub struct DocumentConnection {
    project_id: String,
    credentials_path: Option<String>,
    deadlines: Deadlines,
    client: Mutex<Option<Arc<DocumentClient>>>,
}

impl DocumentConnection {
    pub fn new(
        project_id: impl Into<String>,
        credentials_path: Option<String>,
        deadlines: Deadlines,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            credentials_path,
            deadlines,
            client: Mutex::new(None),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn resolve_credentials(&self) -> DbResult<CredentialSource> {
        if let Some(path) = &self.credentials_path {
            let client_email = self.load_key(path).await?;
            return Ok(CredentialSource::ServiceAccount {
                path: path.clone(),
                client_email,
            });
        }
        match std::env::var(APPLICATION_CREDENTIALS_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                let client_email = self.load_key(&path).await?;
                Ok(CredentialSource::ApplicationDefault { path, client_email })
            }
            _ => Ok(CredentialSource::MetadataServer),
        }
    }

    /// Read and validate a key file, returning its client email.
    async fn load_key(&self, path: &str) -> DbResult<String> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            DbError::connection(
                format!("Failed to read credentials file '{}': {}", path, e),
                "Check FIRESTORE_CREDENTIALS_PATH points to a readable service account key",
            )
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&contents).map_err(|e| {
            DbError::connection(
                format!("Invalid credentials file '{}': {}", path, e),
                "Download a fresh JSON key for the service account",
            )
        })?;
        if key.key_type != SERVICE_ACCOUNT_TYPE {
            return Err(DbError::connection(
                format!(
                    "Credentials file '{}' has type '{}', expected '{}'",
                    path, key.key_type, SERVICE_ACCOUNT_TYPE
                ),
                "Use a service account key file",
            ));
        }
        if key.private_key.is_none() {
            return Err(DbError::connection(
                format!("Credentials file '{}' has no private key", path),
                "Download a fresh JSON key for the service account",
            ));
        }
        if let Some(key_project) = key.project_id.as_deref().filter(|p| *p != self.project_id) {
            warn!(
                key_project = %key_project,
                project_id = %self.project_id,
                "Service account belongs to a different project"
            );
        }
        Ok(key.client_email)
    }
}

impl std::fmt::Debug for DocumentConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentConnection")
            .field("project_id", &self.project_id)
            .field("credentials_path", &self.credentials_path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for DocumentConnection {
    type Handle = Arc<DocumentClient>;

    fn kind(&self) -> BackendKind {
        BackendKind::DocumentStore
    }

    async fn connect(&self) -> DbResult<Arc<DocumentClient>> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let credentials =
            with_deadline("connect", self.deadlines.connect, self.resolve_credentials()).await?;
        let client = Arc::new(DocumentClient {
            project_id: self.project_id.clone(),
            credentials,
        });

        info!(
            backend = "firestore",
            project_id = %self.project_id,
            database = %client.database_path(),
            "Client created"
        );
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn disconnect(&self) -> DbResult<()> {
        if self.client.lock().await.take().is_some() {
            info!(backend = "firestore", project_id = %self.project_id, "Client dropped");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    async fn describe(&self) -> ConnectionInfo {
        ConnectionInfo {
            backend: BackendKind::DocumentStore,
            locator: format!("firestore://{}", self.project_id),
            credentials_path: self.credentials_path.clone(),
            connected: self.is_connected().await,
        }
    }
}

/// Transaction manager for the document store.
pub struct DocumentTransactionManager {
    id: String,
    connection: Arc<DocumentConnection>,
    state: TxState,
}

impl DocumentTransactionManager {
    pub fn new(connection: Arc<DocumentConnection>) -> Self {
        Self {
            id: generate_transaction_id(),
            connection,
            state: TxState::Idle,
        }
    }
}

#[async_trait]
impl Executor for DocumentTransactionManager {
    fn backend(&self) -> BackendKind {
        BackendKind::DocumentStore
    }

    async fn execute(&mut self, statement: &str, _params: &Params) -> DbResult<Vec<Row>> {
        debug!(
            transaction_id = %self.id,
            backend = "firestore",
            sql = %statement,
            "Rejecting statement"
        );
        Err(DbError::unsupported(
            BackendKind::DocumentStore.as_str(),
            statement.trim(),
        ))
    }
}

#[async_trait]
impl TransactionManager for DocumentTransactionManager {
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
        info!(transaction_id = %self.id, backend = "firestore", "Transaction started");
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        if self.state.is_active() {
            self.state = TxState::Idle;
            info!(transaction_id = %self.id, backend = "firestore", "Transaction committed");
        }
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        if self.state.is_active() {
            self.state = TxState::Idle;
            // Writes are applied as they happen; there is nothing to revert.
            info!(
                transaction_id = %self.id,
                backend = "firestore",
                "Transaction rolled back (non-atomic backend, nothing reverted)"
            );
        }
        Ok(())
    }
}
