//! PKCE challenge and OAuth state handling.
//!
//! Login initiation mints a random verifier, its S256 challenge, and
//! single-use `state`/`nonce` values. The record lives in the TTL store
//! keyed by `state`; callback processing consumes it with an atomic
//! fetch-and-delete, so a captured callback URL can be presented at most
//! once.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::AuthConfig;
use crate::store::TtlStore;

/// Server-held record correlating an authorization request with its
/// callback. The verifier never leaves this process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateRecord {
    pub state: String,
    pub nonce: String,
    pub verifier: String,
    pub created_at: i64,
}

/// Outcome of `begin_auth`: where to send the browser.
#[derive(Debug)]
pub struct AuthRequest {
    pub authorization_url: Url,
    pub state: String,
}

pub struct StateStore {
    store: Arc<dyn TtlStore>,
}

impl StateStore {
    #[must_use]
    pub fn new(store: Arc<dyn TtlStore>) -> Self {
        Self { store }
    }

    /// Start an authorization request: generate PKCE material plus
    /// `state` and `nonce`, persist the record, and build the IdP
    /// authorization URL.
    ///
    /// # Errors
    ///
    /// Returns an error if random generation, serialization, or the
    /// store write fails.
    pub async fn begin_auth(&self, config: &AuthConfig, now: i64) -> Result<AuthRequest> {
        let verifier = generate_token()?;
        let challenge = s256_challenge(&verifier);
        let state = generate_token()?;
        let nonce = generate_token()?;

        let record = StateRecord {
            state: state.clone(),
            nonce: nonce.clone(),
            verifier,
            created_at: now,
        };
        let bytes = serde_json::to_vec(&record).context("failed to serialize state record")?;
        let ttl = u64::try_from(config.state_ttl_seconds()).unwrap_or(0);
        self.store
            .put(&state_key(&state), bytes, Duration::from_secs(ttl))
            .await
            .context("failed to persist state record")?;

        let mut authorization_url = Url::parse(config.idp_base_url())
            .context("invalid IdP base URL")?
            .join("/authorize")
            .context("failed to build authorization URL")?;
        authorization_url
            .query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", config.client_id())
            .append_pair("redirect_uri", config.redirect_uri())
            .append_pair("scope", config.scope())
            .append_pair("state", &state)
            .append_pair("nonce", &nonce)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(AuthRequest {
            authorization_url,
            state,
        })
    }

    /// Atomically fetch and delete the record for `state`.
    ///
    /// `None` covers expiry and replay alike; callers must not reveal
    /// which one happened.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure, never for a missing record.
    pub async fn consume_state(&self, state: &str) -> Result<Option<StateRecord>> {
        let Some(bytes) = self
            .store
            .take(&state_key(state))
            .await
            .context("failed to consume state record")?
        else {
            return Ok(None);
        };
        let record =
            serde_json::from_slice(&bytes).context("failed to deserialize state record")?;
        Ok(Some(record))
    }
}

fn state_key(state: &str) -> String {
    format!("state:{state}")
}

/// 32 bytes from the OS RNG, base64url without padding.
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// S256: base64url(sha256(verifier)).
fn s256_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    Base64UrlUnpadded::encode_string(&hasher.finalize())
}
