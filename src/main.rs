//! Item Store - Main entry point.
//!
//! Runs one item operation against the configured backend and prints the
//! result as JSON.

use clap::Parser;
use item_store::config::{Command, Config};
use item_store::models::NewItem;
use item_store::{Datastore, DbError, ItemService};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout carries command output
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(service: &ItemService, command: &Command) -> Result<serde_json::Value, DbError> {
    let output = match command {
        Command::Init => {
            service.init_schema().await?;
            serde_json::json!({ "initialized": true })
        }
        Command::List => serde_json::to_value(service.list_items().await?)?,
        Command::Get { id } => match service.get_item(*id).await? {
            Some(item) => serde_json::to_value(item)?,
            None => return Err(DbError::invalid_input(format!("Item {} not found", id))),
        },
        Command::Create { name, price } => {
            service.create_item(&NewItem::new(name.as_str(), *price)).await?;
            serde_json::json!({ "created": true })
        }
        Command::Update { id, name, price } => {
            let updated = service
                .update_item(*id, &NewItem::new(name.as_str(), *price))
                .await?;
            serde_json::json!({ "updated": updated })
        }
        Command::Delete { id } => {
            let deleted = service.delete_item(*id).await?;
            serde_json::json!({ "deleted": deleted })
        }
        Command::Describe => serde_json::to_value(service.datastore().describe().await)?,
    };
    Ok(output)
}

fn report(e: &DbError) {
    error!(error = %e, "Command failed");
    eprintln!("Error: {}", e);
    if let Some(suggestion) = e.suggestion() {
        eprintln!("Suggestion: {}", suggestion);
    }
}

#[tokio::main]
async fn main() {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        command = ?config.command,
        "Starting item-store v{}",
        env!("CARGO_PKG_VERSION")
    );

    let datastore = match Datastore::from_args(&config.database) {
        Ok(datastore) => Arc::new(datastore),
        Err(e) => {
            report(&e);
            std::process::exit(2);
        }
    };
    let service = ItemService::new(datastore.clone());

    let result = run(&service, &config.command).await;
    if let Err(e) = datastore.close().await {
        report(&e);
    }

    match result {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: failed to render output: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            report(&e);
            std::process::exit(1);
        }
    }
}
