//! Repositories: domain access through an [`Executor`](crate::db::Executor).
//!
//! Repositories never open connections. They receive the transaction manager
//! of the current unit of work and issue named-placeholder statements on it.

pub mod item;

pub use item::ItemRepository;
