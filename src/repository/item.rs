//! Item repository.

use crate::db::Executor;
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, Item, NewItem, Row};
use crate::params;
use tracing::debug;

const SQLITE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    price REAL NOT NULL
)";

const MYSQL_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS item (
    id INT AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    price DOUBLE NOT NULL
)";

const SELECT_ITEMS: &str = "SELECT id, name, price FROM item ORDER BY id";
const SELECT_ITEM: &str = "SELECT id, name, price FROM item WHERE id = :id";
const INSERT_ITEM: &str = "INSERT INTO item (name, price) VALUES (:name, :price)";
const UPDATE_ITEM: &str = "UPDATE item SET name = :name, price = :price WHERE id = :id";
const DELETE_ITEM: &str = "DELETE FROM item WHERE id = :id";

/// CRUD statements for the `item` table.
pub struct ItemRepository;

impl ItemRepository {
    /// Create the `item` table if it does not exist.
    pub async fn ensure_schema<E>(executor: &mut E) -> DbResult<()>
    where
        E: Executor + ?Sized,
    {
        let ddl = match executor.backend() {
            BackendKind::EmbeddedSql => SQLITE_SCHEMA,
            BackendKind::ClientServerSql => MYSQL_SCHEMA,
            BackendKind::DocumentStore => {
                // Collections come into existence on first write
                debug!("Schemaless backend; nothing to create");
                return Ok(());
            }
        };
        executor.run(ddl).await?;
        Ok(())
    }

    /// All items, ordered by id.
    pub async fn get_items<E>(executor: &mut E) -> DbResult<Vec<Item>>
    where
        E: Executor + ?Sized,
    {
        let rows = executor.run(SELECT_ITEMS).await?;
        rows.iter().map(Item::try_from).collect()
    }

    /// The item with `id`, if any.
    pub async fn get_item<E>(executor: &mut E, id: i64) -> DbResult<Option<Item>>
    where
        E: Executor + ?Sized,
    {
        let rows = executor.execute(SELECT_ITEM, &params! { "id" => id }).await?;
        rows.first().map(Item::try_from).transpose()
    }

    pub async fn create_item<E>(executor: &mut E, item: &NewItem) -> DbResult<()>
    where
        E: Executor + ?Sized,
    {
        let params = params! { "name" => item.name.as_str(), "price" => item.price };
        executor.execute(INSERT_ITEM, &params).await?;
        Ok(())
    }

    /// Replace name and price; returns the number of rows changed.
    pub async fn update_item<E>(executor: &mut E, id: i64, item: &NewItem) -> DbResult<u64>
    where
        E: Executor + ?Sized,
    {
        let params = params! {
            "id" => id,
            "name" => item.name.as_str(),
            "price" => item.price,
        };
        let rows = executor.execute(UPDATE_ITEM, &params).await?;
        affected(&rows)
    }

    /// Delete by id; returns the number of rows removed.
    pub async fn delete_item<E>(executor: &mut E, id: i64) -> DbResult<u64>
    where
        E: Executor + ?Sized,
    {
        let rows = executor.execute(DELETE_ITEM, &params! { "id" => id }).await?;
        affected(&rows)
    }
}

fn affected(rows: &[Row]) -> DbResult<u64> {
    rows.first()
        .and_then(Row::affected_count)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| DbError::decode("Mutation did not report an affected-row count"))
}
