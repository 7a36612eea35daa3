//! Item operations with begin/commit/rollback orchestration.
//!
//! [`Datastore`] owns the resolved configuration and the shared connection.
//! [`ItemService`] runs each operation as one unit of work: a fresh
//! transaction manager, `begin()`, the repository calls, then [`settle`].

use crate::config::{DatabaseArgs, Deadlines};
use crate::db::{ConnectionFactory, DbConnection, TransactionManager, TransactionManagerFactory, settle};
use crate::error::DbResult;
use crate::models::{ConnectionConfig, ConnectionInfo, Item, NewItem};
use crate::repository::ItemRepository;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration plus the connection whose handle is memoized across
/// transaction managers.
#[derive(Debug)]
pub struct Datastore {
    config: ConnectionConfig,
    connection: DbConnection,
}

impl Datastore {
    /// Build the datastore. Does not connect.
    pub fn new(config: ConnectionConfig, deadlines: Deadlines) -> Self {
        let connection = ConnectionFactory::create(&config, deadlines);
        debug!(backend = %config.kind(), "Datastore created");
        Self { config, connection }
    }

    /// Resolve configuration and deadlines from database arguments.
    pub fn from_args(args: &DatabaseArgs) -> DbResult<Self> {
        Ok(Self::new(args.resolve()?, args.deadlines()?))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn connection(&self) -> &DbConnection {
        &self.connection
    }

    /// A new Idle transaction manager over the shared connection.
    pub fn transaction_manager(&self) -> DbResult<Box<dyn TransactionManager>> {
        TransactionManagerFactory::create_manager(&self.connection, &self.config)
    }

    pub async fn describe(&self) -> ConnectionInfo {
        self.connection.describe().await
    }

    /// Release the native handle, waiting for the backend to close it.
    pub async fn close(&self) -> DbResult<()> {
        self.connection.disconnect().await?;
        info!(backend = %self.config.kind(), "Datastore closed");
        Ok(())
    }
}

/// Item use cases, one transaction each.
#[derive(Debug, Clone)]
pub struct ItemService {
    datastore: Arc<Datastore>,
}

impl ItemService {
    pub fn new(datastore: Arc<Datastore>) -> Self {
        Self { datastore }
    }

    pub fn datastore(&self) -> &Arc<Datastore> {
        &self.datastore
    }

    async fn begin(&self) -> DbResult<Box<dyn TransactionManager>> {
        let mut tm = self.datastore.transaction_manager()?;
        tm.begin().await?;
        Ok(tm)
    }

    pub async fn init_schema(&self) -> DbResult<()> {
        let mut tm = self.begin().await?;
        let outcome = ItemRepository::ensure_schema(tm.as_mut()).await;
        settle(tm.as_mut(), outcome).await
    }

    pub async fn list_items(&self) -> DbResult<Vec<Item>> {
        let mut tm = self.begin().await?;
        let outcome = ItemRepository::get_items(tm.as_mut()).await;
        settle(tm.as_mut(), outcome).await
    }

    pub async fn get_item(&self, id: i64) -> DbResult<Option<Item>> {
        let mut tm = self.begin().await?;
        let outcome = ItemRepository::get_item(tm.as_mut(), id).await;
        settle(tm.as_mut(), outcome).await
    }

    pub async fn create_item(&self, item: &NewItem) -> DbResult<()> {
        let mut tm = self.begin().await?;
        let outcome = ItemRepository::create_item(tm.as_mut(), item).await;
        settle(tm.as_mut(), outcome).await
    }

    /// Returns the number of items changed (0 when `id` does not exist).
    pub async fn update_item(&self, id: i64, item: &NewItem) -> DbResult<u64> {
        let mut tm = self.begin().await?;
        let outcome = ItemRepository::update_item(tm.as_mut(), id, item).await;
        settle(tm.as_mut(), outcome).await
    }

    /// Returns the number of items removed (0 when `id` does not exist).
    pub async fn delete_item(&self, id: i64) -> DbResult<u64> {
        let mut tm = self.begin().await?;
        let outcome = ItemRepository::delete_item(tm.as_mut(), id).await;
        settle(tm.as_mut(), outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;

    fn service(dir: &tempfile::TempDir) -> ItemService {
        let path = dir.path().join("items.db").to_string_lossy().to_string();
        let config = ConnectionConfig::EmbeddedSql { path };
        ItemService::new(Arc::new(Datastore::new(config, Deadlines::default())))
    }

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        service.init_schema().await.unwrap();

        service.create_item(&NewItem::new("Widget", 9.99)).await.unwrap();
        let items = service.list_items().await.unwrap();
        assert_eq!(
            items,
            vec![Item {
                id: 1,
                name: "Widget".to_string(),
                price: 9.99
            }]
        );

        assert_eq!(
            service.update_item(1, &NewItem::new("Gadget", 12.5)).await.unwrap(),
            1
        );
        let item = service.get_item(1).await.unwrap().unwrap();
        assert_eq!(item.name, "Gadget");

        assert_eq!(service.delete_item(1).await.unwrap(), 1);
        assert_eq!(service.delete_item(1).await.unwrap(), 0);
        assert!(service.get_item(1).await.unwrap().is_none());

        service.datastore().close().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_failure_is_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        // No schema: the table does not exist
        let err = service.list_items().await.unwrap_err();
        assert!(matches!(err, DbError::Execution { .. }));
        assert!(err.to_string().contains("item"));
        service.datastore().close().await.unwrap();
    }
}
