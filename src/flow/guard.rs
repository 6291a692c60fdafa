//! Read-side session validation for request handling.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use utoipa::ToSchema;

use crate::session::SessionStore;
use crate::token::{TokenCodec, TokenKind};

/// What a session looks like to the application: identity and lifecycle
/// metadata only. IdP tokens never appear here, structurally.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IdentityView {
    pub user_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub created_at: i64,
    pub last_activity: i64,
    pub access_token_expires_at: i64,
    /// Unix time from which the UI should proactively refresh.
    pub refresh_after: i64,
}

/// Validates a session token plus the caller's network identity and
/// yields the identity behind it. Holds no signing capability.
pub struct SessionGuard {
    sessions: Arc<SessionStore>,
    codec: Arc<TokenCodec>,
    refresh_threshold_seconds: i64,
}

impl SessionGuard {
    #[must_use]
    pub fn new(
        sessions: Arc<SessionStore>,
        codec: Arc<TokenCodec>,
        refresh_threshold_seconds: i64,
    ) -> Self {
        Self {
            sessions,
            codec,
            refresh_threshold_seconds,
        }
    }

    /// Resolve a session token to the identity it represents.
    ///
    /// `None` covers every rejection: bad signature, expired token,
    /// missing session, binding mismatch, idle or absolute expiry. A
    /// successful lookup counts as activity and pushes the idle window
    /// forward.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure.
    pub async fn identity_for(
        &self,
        session_token: &str,
        client_ip: &str,
        client_fingerprint: &str,
        now: i64,
    ) -> Result<Option<IdentityView>> {
        let Ok(claims) = self.codec.verify(session_token, TokenKind::Access, now) else {
            return Ok(None);
        };

        let Some(record) = self
            .sessions
            .get(&claims.sid, client_ip, client_fingerprint, true, now)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(IdentityView {
            user_id: record.user_id,
            email: record.email,
            display_name: record.display_name,
            created_at: record.created_at,
            last_activity: record.last_activity,
            access_token_expires_at: record.access_token_expires_at,
            refresh_after: record.access_token_expires_at - self.refresh_threshold_seconds,
        }))
    }
}
