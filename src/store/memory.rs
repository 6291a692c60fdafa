//! In-memory [`TtlStore`] backed by a mutex-guarded map.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{StoreError, TtlStore};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Single-process store. Entries expire lazily: every operation sweeps
/// the map before acting, so expired values are never observable.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TtlStore for MemoryStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        // Remove under the lock so two concurrent callers cannot both win.
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.remove(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_round_trip() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store
            .put("k", b"value".to_vec(), Duration::from_secs(60))
            .await?;
        assert_eq!(store.get("k").await?, Some(b"value".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn take_is_single_use() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store
            .put("state", b"record".to_vec(), Duration::from_secs(60))
            .await?;
        assert_eq!(store.take("state").await?, Some(b"record".to_vec()));
        assert_eq!(store.take("state").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.put("k", b"v".to_vec(), Duration::ZERO).await?;
        assert_eq!(store.get("k").await?, None);
        assert_eq!(store.take("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store
            .put("k", b"v".to_vec(), Duration::from_secs(60))
            .await?;
        store.delete("k").await?;
        store.delete("k").await?;
        assert_eq!(store.get("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_take_has_single_winner() -> Result<(), StoreError> {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        store
            .put("state", b"record".to_vec(), Duration::from_secs(60))
            .await?;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.take("state").await.ok().flatten() },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.map(|value| value.is_some()).unwrap_or(false) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        Ok(())
    }
}
