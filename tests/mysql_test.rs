//! Integration tests that require a running MySQL server.
//!
//! Set TEST_MYSQL_HOST to run them; TEST_MYSQL_PORT, TEST_MYSQL_USER,
//! TEST_MYSQL_PASSWORD and TEST_MYSQL_DATABASE default to
//! 3306, root, "" and test.
//! Example: TEST_MYSQL_HOST=127.0.0.1 TEST_MYSQL_PASSWORD=root cargo test --test mysql_test

use item_store::config::Deadlines;
use item_store::db::{
    Connection, Executor, MySqlConnection, MySqlTransactionManager, TransactionManager, settle,
};
use item_store::error::DbError;
use item_store::models::{ConnectionConfig, NewItem, Value};
use item_store::params;
use item_store::{Datastore, ItemService};
use std::sync::Arc;

struct MySqlTarget {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
}

fn target() -> Option<MySqlTarget> {
    let host = match std::env::var("TEST_MYSQL_HOST") {
        Ok(host) => host,
        Err(_) => {
            eprintln!("Skipping test: TEST_MYSQL_HOST not set");
            return None;
        }
    };
    let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    Some(MySqlTarget {
        host,
        port: var("TEST_MYSQL_PORT", "3306").parse().unwrap(),
        user: var("TEST_MYSQL_USER", "root"),
        password: var("TEST_MYSQL_PASSWORD", ""),
        database: var("TEST_MYSQL_DATABASE", "test"),
    })
}

impl MySqlTarget {
    fn connection(&self) -> Arc<MySqlConnection> {
        Arc::new(MySqlConnection::new(
            self.host.clone(),
            self.port,
            self.user.clone(),
            self.password.clone(),
            self.database.clone(),
            Deadlines::default(),
        ))
    }

    fn config(&self) -> ConnectionConfig {
        ConnectionConfig::ClientServerSql {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

async fn reset_table(conn: &Arc<MySqlConnection>, table: &str) {
    let mut tm = MySqlTransactionManager::new(conn.clone());
    tm.run(&format!("DROP TABLE IF EXISTS {}", table)).await.unwrap();
    tm.run(&format!(
        "CREATE TABLE {} (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(100) NOT NULL, \
         price DOUBLE NOT NULL, qty BIGINT UNSIGNED NULL, added DATE NULL)",
        table
    ))
    .await
    .unwrap();
}

#[tokio::test]
async fn test_mysql_commit_and_rollback() {
    let Some(target) = target() else { return };
    let conn = target.connection();
    reset_table(&conn, "tx_item_test").await;

    let mut tm = MySqlTransactionManager::new(conn.clone());
    tm.begin().await.unwrap();
    tm.execute(
        "INSERT INTO tx_item_test (name, price) VALUES (:name, :price)",
        &params! { "name" => "Widget", "price" => 9.99 },
    )
    .await
    .unwrap();
    tm.commit().await.unwrap();

    tm.begin().await.unwrap();
    tm.execute(
        "INSERT INTO tx_item_test (name, price) VALUES (:name, :price)",
        &params! { "name" => "Discarded", "price" => 1.0 },
    )
    .await
    .unwrap();
    tm.rollback().await.unwrap();

    let rows = tm
        .run("SELECT id, name, price FROM tx_item_test ORDER BY id")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::from("Widget")));
    assert_eq!(rows[0].get("price"), Some(&Value::Float(9.99)));

    tm.run("DROP TABLE tx_item_test").await.unwrap();
    conn.disconnect().await.unwrap();
    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_mysql_settle_rolls_back_on_error() {
    let Some(target) = target() else { return };
    let conn = target.connection();
    reset_table(&conn, "tx_settle_test").await;

    let mut tm = MySqlTransactionManager::new(conn.clone());
    tm.begin().await.unwrap();
    let outcome = async {
        tm.execute(
            "INSERT INTO tx_settle_test (name, price) VALUES (:name, :price)",
            &params! { "name" => "Widget", "price" => 9.99 },
        )
        .await?;
        tm.run("INSERT INTO no_such_table (x) VALUES (1)").await
    }
    .await;
    let err = settle(&mut tm, outcome).await.unwrap_err();
    assert!(matches!(err, DbError::Execution { .. }));

    let rows = tm
        .run("SELECT COUNT(*) AS n FROM tx_settle_test")
        .await
        .unwrap();
    assert_eq!(rows[0].get("n"), Some(&Value::Int(0)));

    tm.run("DROP TABLE tx_settle_test").await.unwrap();
    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_mysql_type_decoding() {
    let Some(target) = target() else { return };
    let conn = target.connection();
    reset_table(&conn, "tx_types_test").await;

    let mut tm = MySqlTransactionManager::new(conn.clone());
    tm.run(
        "INSERT INTO tx_types_test (name, price, qty, added) \
         VALUES ('Big', 1.5, 18446744073709551615, '2024-03-01')",
    )
    .await
    .unwrap();
    let rows = tm
        .run("SELECT qty, added, CAST(2.50 AS DECIMAL(5,2)) AS d FROM tx_types_test")
        .await
        .unwrap();
    assert_eq!(rows[0].get("qty"), Some(&Value::from("18446744073709551615")));
    assert_eq!(rows[0].get("added"), Some(&Value::from("2024-03-01")));
    assert_eq!(rows[0].get("d"), Some(&Value::Float(2.5)));

    tm.run("DROP TABLE tx_types_test").await.unwrap();
    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_mysql_item_service() {
    let Some(target) = target() else { return };
    let store = Arc::new(Datastore::new(target.config(), Deadlines::default()));
    let service = ItemService::new(store.clone());

    service.init_schema().await.unwrap();
    service.create_item(&NewItem::new("Widget", 9.99)).await.unwrap();
    let items = service.list_items().await.unwrap();
    let created = items.iter().find(|i| i.name == "Widget").unwrap();
    assert_eq!(service.delete_item(created.id).await.unwrap(), 1);

    let info = store.describe().await;
    assert!(info.connected);
    if !target.password.is_empty() {
        assert!(!info.locator.contains(&target.password));
    }
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_mysql_bad_credentials_is_connection_error() {
    let Some(target) = target() else { return };
    let conn = Arc::new(MySqlConnection::new(
        target.host.clone(),
        target.port,
        target.user.clone(),
        format!("{}-wrong", target.password),
        target.database.clone(),
        Deadlines::default(),
    ));
    let err = conn.connect().await.unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }));
    assert!(err.suggestion().is_some());
    assert!(!conn.is_connected().await);
}
