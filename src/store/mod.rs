//! TTL-capable shared store.
//!
//! All shared mutable state (state records, sessions) lives behind
//! [`TtlStore`]; request handlers never cache it beyond a single request.
//! The in-memory implementation is the default; persistent backends plug
//! in behind the same trait.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Key/value store with per-entry time-to-live.
///
/// `take` must be an atomic fetch-and-delete: when two concurrent
/// callers present the same key, at most one observes the value.
#[async_trait]
pub trait TtlStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomically fetch and delete the value for `key`.
    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove `key`. Idempotent; absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
