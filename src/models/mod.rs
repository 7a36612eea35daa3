//! Data models for item-store.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod item;
pub mod query;

// Re-export commonly used types
pub use connection::{BackendKind, ConnectionConfig, ConnectionInfo};
pub use item::{Item, NewItem};
pub use query::{AFFECTED_ROWS_COLUMN, Params, Row, Value};
