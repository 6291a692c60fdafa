//! Canonical session records and their lifecycle.
//!
//! A session is created on a successful callback, mutated on refresh and
//! activity, and deleted on logout, binding failure, idle timeout, or
//! the absolute ceiling. Storage TTLs are always the *remaining*
//! absolute budget, so re-storing on activity can never extend a session
//! past the ceiling.
//!
//! Store keys are SHA-256 hashes of the session id; the raw id never
//! touches the store.

pub mod crypto;

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::store::TtlStore;

/// Canonical session state. The token fields are sealed
/// (`session::crypto`) and opaque to everything but the flow controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: i64,
    pub last_activity: i64,
    pub access_token_expires_at: i64,
    pub client_ip: String,
    pub client_fingerprint: String,
    pub access_token_sealed: Vec<u8>,
    pub refresh_token_sealed: Option<Vec<u8>>,
    pub id_token_sealed: Option<Vec<u8>>,
}

pub struct SessionStore {
    store: Arc<dyn TtlStore>,
    idle_timeout_seconds: i64,
    absolute_timeout_seconds: i64,
}

impl SessionStore {
    #[must_use]
    pub fn new(
        store: Arc<dyn TtlStore>,
        idle_timeout_seconds: i64,
        absolute_timeout_seconds: i64,
    ) -> Self {
        Self {
            store,
            idle_timeout_seconds,
            absolute_timeout_seconds,
        }
    }

    /// Store a freshly created record with TTL = the full absolute window.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store write fails.
    pub async fn create(&self, record: &SessionRecord) -> Result<()> {
        self.persist(record, self.absolute_timeout_seconds).await
    }

    /// Fetch and validate a session.
    ///
    /// In order: fetch; binding check (mismatch deletes the record);
    /// absolute-ceiling check; idle-timeout check; optionally update
    /// `last_activity` and re-store with the remaining absolute budget.
    ///
    /// Binding mismatch, idle expiry, and absence are all `None` to the
    /// caller; only the log lines differ.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure, never for an invalid
    /// session.
    pub async fn get(
        &self,
        session_id: &str,
        current_ip: &str,
        current_fingerprint: &str,
        update_activity: bool,
        now: i64,
    ) -> Result<Option<SessionRecord>> {
        let key = session_key(session_id);
        let Some(bytes) = self
            .store
            .get(&key)
            .await
            .context("failed to fetch session record")?
        else {
            return Ok(None);
        };
        let mut record: SessionRecord =
            serde_json::from_slice(&bytes).context("failed to deserialize session record")?;

        if record.client_ip != current_ip || record.client_fingerprint != current_fingerprint {
            // Either a stolen cookie or a mid-session network change;
            // both invalidate the session.
            warn!(
                session_id,
                expected_ip = record.client_ip,
                presented_ip = current_ip,
                "session binding mismatch, deleting session"
            );
            self.delete(session_id).await?;
            return Ok(None);
        }

        if now - record.created_at > self.absolute_timeout_seconds {
            self.delete(session_id).await?;
            return Ok(None);
        }

        if now - record.last_activity > self.idle_timeout_seconds {
            warn!(session_id, "session idle timeout, deleting session");
            self.delete(session_id).await?;
            return Ok(None);
        }

        if update_activity {
            record.last_activity = now;
            let remaining = self.absolute_timeout_seconds - (now - record.created_at);
            self.persist(&record, remaining).await?;
        }

        Ok(Some(record))
    }

    /// Re-store a mutated record, preserving the absolute ceiling: the
    /// TTL is the remaining budget as of `now`, never the full window.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store write fails.
    pub async fn update(&self, record: &SessionRecord, now: i64) -> Result<()> {
        let remaining = self.absolute_timeout_seconds - (now - record.created_at);
        self.persist(record, remaining).await
    }

    /// Unconditional removal; idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store delete fails.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        self.store
            .delete(&session_key(session_id))
            .await
            .context("failed to delete session record")
    }

    async fn persist(&self, record: &SessionRecord, ttl_seconds: i64) -> Result<()> {
        let bytes = serde_json::to_vec(record).context("failed to serialize session record")?;
        let ttl = u64::try_from(ttl_seconds).unwrap_or(0);
        self.store
            .put(
                &session_key(&record.session_id),
                bytes,
                Duration::from_secs(ttl),
            )
            .await
            .context("failed to store session record")
    }
}

/// Hash a session id so raw values never touch the store.
fn session_key(session_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    format!(
        "session:{}",
        Base64UrlUnpadded::encode_string(&hasher.finalize())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const NOW: i64 = 1_700_000_000;
    const IDLE: i64 = 1800;
    const ABSOLUTE: i64 = 14_400;

    fn session_store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryStore::new()), IDLE, ABSOLUTE)
    }

    fn record(session_id: &str) -> SessionRecord {
        SessionRecord {
            session_id: session_id.to_string(),
            user_id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            display_name: Some("Alice".to_string()),
            created_at: NOW,
            last_activity: NOW,
            access_token_expires_at: NOW + 3600,
            client_ip: "1.2.3.4".to_string(),
            client_fingerprint: "ua-hash-A".to_string(),
            access_token_sealed: vec![1, 2, 3],
            refresh_token_sealed: Some(vec![4, 5, 6]),
            id_token_sealed: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_with_matching_binding() -> Result<()> {
        let store = session_store();
        store.create(&record("sid-a")).await?;

        let found = store
            .get("sid-a", "1.2.3.4", "ua-hash-A", false, NOW + 10)
            .await?
            .expect("session should be found");
        assert_eq!(found.user_id, "u1");
        // No activity update requested.
        assert_eq!(found.last_activity, NOW);
        Ok(())
    }

    #[tokio::test]
    async fn update_activity_moves_last_activity() -> Result<()> {
        let store = session_store();
        store.create(&record("sid-a")).await?;

        let found = store
            .get("sid-a", "1.2.3.4", "ua-hash-A", true, NOW + 100)
            .await?
            .expect("session should be found");
        assert_eq!(found.last_activity, NOW + 100);

        let again = store
            .get("sid-a", "1.2.3.4", "ua-hash-A", false, NOW + 150)
            .await?
            .expect("session should persist");
        assert_eq!(again.last_activity, NOW + 100);
        Ok(())
    }

    #[tokio::test]
    async fn binding_mismatch_deletes_record() -> Result<()> {
        let store = session_store();
        store.create(&record("sid-a")).await?;

        // Wrong IP invalidates the session.
        assert!(store
            .get("sid-a", "9.9.9.9", "ua-hash-A", false, NOW + 10)
            .await?
            .is_none());
        // Even the rightful client cannot use it afterwards.
        assert!(store
            .get("sid-a", "1.2.3.4", "ua-hash-A", false, NOW + 10)
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn fingerprint_mismatch_deletes_record() -> Result<()> {
        let store = session_store();
        store.create(&record("sid-a")).await?;

        assert!(store
            .get("sid-a", "1.2.3.4", "ua-hash-B", false, NOW + 10)
            .await?
            .is_none());
        assert!(store
            .get("sid-a", "1.2.3.4", "ua-hash-A", false, NOW + 10)
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn idle_timeout_expires_session() -> Result<()> {
        let store = session_store();
        store.create(&record("sid-a")).await?;

        assert!(store
            .get("sid-a", "1.2.3.4", "ua-hash-A", false, NOW + IDLE + 1)
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn activity_resets_idle_but_not_absolute() -> Result<()> {
        let store = session_store();
        store.create(&record("sid-a")).await?;

        // Touch the session right before the idle deadline, repeatedly,
        // all the way past the absolute ceiling.
        let mut now = NOW;
        while now + IDLE - 1 < NOW + ABSOLUTE {
            now += IDLE - 1;
            let _ = store.get("sid-a", "1.2.3.4", "ua-hash-A", true, now).await?;
        }

        assert!(store
            .get("sid-a", "1.2.3.4", "ua-hash-A", true, NOW + ABSOLUTE + 1)
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> Result<()> {
        let store = session_store();
        store.create(&record("sid-a")).await?;
        store.delete("sid-a").await?;
        store.delete("sid-a").await?;
        assert!(store
            .get("sid-a", "1.2.3.4", "ua-hash-A", false, NOW)
            .await?
            .is_none());
        Ok(())
    }

    #[test]
    fn session_keys_are_hashed_and_stable() {
        let first = session_key("sid-a");
        let second = session_key("sid-a");
        let other = session_key("sid-b");
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(!first.contains("sid-a"));
    }
}
