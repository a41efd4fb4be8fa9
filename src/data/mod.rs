//! Data layer module
//!
//! Handles all data persistence and caching:
//! - SQLite database operations (the durable store)
//! - Volatile namespaced cache (Moka)
//! - The persistence coordinator every write funnels through

mod cache;
mod coordinator;
mod database;
mod models;
mod store;

pub use cache::{MemoryCache, Namespace, StateCache};
pub use coordinator::{CacheItem, Coordinator, WriteOutcome};
pub use database::Database;
pub use models::*;
pub use store::{AccountPage, EntityStore};
