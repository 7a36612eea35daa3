//! Item Store Library
//!
//! A uniform transaction contract (begin, execute, commit, rollback) over
//! SQLite, MySQL and Firestore, with an item CRUD service built on top.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use service::{Datastore, ItemService};
