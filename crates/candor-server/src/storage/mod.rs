//! Storage layer
//!
//! SQLite (embedded) is the backing store; DashMap holds the process-local cache.

pub mod db;
#[cfg(test)]
pub mod flaky;
pub mod memory;

pub use db::{Database, PoolSettings};
pub use memory::{CacheStats, MemoryCache};
