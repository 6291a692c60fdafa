//! Flow controller: the one component that sequences login, callback,
//! refresh, and logout across the state store, the IdP, the session
//! store, and the token codec.
//!
//! Handlers call into this module and translate its errors to HTTP;
//! nothing here knows about cookies or status codes.

mod guard;

pub use guard::{IdentityView, SessionGuard};

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::AuthConfig;
use crate::idp::{verify_id_token, IdpClient};
use crate::pkce::{generate_token, StateStore};
use crate::rate_limit::{RateLimitAction, RateLimitDecision, RateLimiter};
use crate::session::crypto::{open_token, seal_token};
use crate::session::{SessionRecord, SessionStore};
use crate::token::{TokenCodec, TokenKind};

#[derive(Debug, Error)]
pub enum FlowError {
    /// State is unknown, expired, or already consumed. Indistinguishable
    /// on purpose; the caller restarts the login flow either way.
    #[error("invalid or expired authorization state")]
    InvalidOrExpiredState,
    #[error("identity provider exchange failed")]
    IdpExchange,
    #[error("identity token rejected")]
    IdentityTokenInvalid,
    #[error("session not found or no longer valid")]
    SessionNotFound,
    #[error("rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimitExceeded { retry_after_seconds: u64 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Outcome of a successful callback: what the handler needs to set the
/// cookie and redirect.
#[derive(Debug)]
pub struct EstablishedSession {
    pub session_token: String,
    pub session_id: String,
    pub user_id: String,
}

pub struct FlowController {
    states: StateStore,
    sessions: Arc<SessionStore>,
    codec: Arc<TokenCodec>,
    limiter: Arc<dyn RateLimiter>,
    idp: Arc<dyn IdpClient>,
    config: AuthConfig,
    sealing_key: [u8; 32],
}

impl FlowController {
    #[must_use]
    pub fn new(
        states: StateStore,
        sessions: Arc<SessionStore>,
        codec: Arc<TokenCodec>,
        limiter: Arc<dyn RateLimiter>,
        idp: Arc<dyn IdpClient>,
        config: AuthConfig,
        sealing_key: [u8; 32],
    ) -> Self {
        Self {
            states,
            sessions,
            codec,
            limiter,
            idp,
            config,
            sealing_key,
        }
    }

    fn check_rate(&self, key: &str, action: RateLimitAction, now: i64) -> Result<(), FlowError> {
        match self.limiter.check(key, action, now) {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Limited {
                retry_after_seconds,
            } => {
                warn!(key, action = action.as_str(), "rate limit exceeded");
                Err(FlowError::RateLimitExceeded {
                    retry_after_seconds,
                })
            }
        }
    }

    /// Start a login: mint PKCE and anti-forgery material and return the
    /// IdP authorization URL to redirect the browser to.
    ///
    /// # Errors
    ///
    /// Returns an error if random generation or the state write fails.
    pub async fn login(&self, now: i64) -> Result<Url, FlowError> {
        let request = self.states.begin_auth(&self.config, now).await?;
        info!(state = request.state, "authorization request started");
        Ok(request.authorization_url)
    }

    /// Complete a login from the IdP redirect: consume the state, trade
    /// the code for tokens, verify the identity token, and establish a
    /// session bound to the caller's network identity.
    ///
    /// # Errors
    ///
    /// See [`FlowError`]; any IdP or verification failure leaves no
    /// session behind.
    pub async fn callback(
        &self,
        code: &str,
        state: &str,
        client_ip: &str,
        client_fingerprint: &str,
        now: i64,
    ) -> Result<EstablishedSession, FlowError> {
        self.check_rate(client_ip, RateLimitAction::Callback, now)?;

        let record = self
            .states
            .consume_state(state)
            .await?
            .ok_or(FlowError::InvalidOrExpiredState)?;

        let tokens = self
            .idp
            .exchange_code(code, &record.verifier)
            .await
            .map_err(|err| {
                warn!(error = %err, "authorization code exchange failed");
                FlowError::IdpExchange
            })?;

        let id_token = tokens.id_token.as_deref().ok_or_else(|| {
            warn!("token response carried no identity token");
            FlowError::IdentityTokenInvalid
        })?;
        let jwks = self.idp.jwks().await.map_err(|err| {
            warn!(error = %err, "failed to fetch identity provider keys");
            FlowError::IdpExchange
        })?;
        let identity = verify_id_token(
            id_token,
            &jwks,
            &self.config.expected_issuer(),
            self.config.client_id(),
            &record.nonce,
            now,
        )
        .map_err(|err| {
            warn!(error = %err, "identity token verification failed");
            FlowError::IdentityTokenInvalid
        })?;

        let session_id = generate_token()?;
        let access_sealed = seal_token(
            &self.sealing_key,
            tokens.access_token.as_bytes(),
            &session_id,
        )?;
        let refresh_sealed = tokens
            .refresh_token
            .as_deref()
            .map(|token| seal_token(&self.sealing_key, token.as_bytes(), &session_id))
            .transpose()?;
        let id_sealed = seal_token(&self.sealing_key, id_token.as_bytes(), &session_id)?;

        let session = SessionRecord {
            session_id: session_id.clone(),
            user_id: identity.sub.clone(),
            email: identity.email.unwrap_or_default(),
            display_name: identity.name,
            created_at: now,
            last_activity: now,
            access_token_expires_at: now + tokens.expires_in_seconds,
            client_ip: client_ip.to_string(),
            client_fingerprint: client_fingerprint.to_string(),
            access_token_sealed: access_sealed,
            refresh_token_sealed: refresh_sealed,
            id_token_sealed: Some(id_sealed),
        };
        self.sessions.create(&session).await?;

        // The cookie token lives for the whole absolute window; the IdP
        // access token expiry is tracked on the record instead.
        let session_token = self
            .codec
            .issue_access_token(
                &identity.sub,
                &session_id,
                now + self.config.absolute_timeout_seconds(),
                now,
            )
            .map_err(|err| FlowError::Internal(err.into()))?;

        info!(user_id = identity.sub, "session established");
        Ok(EstablishedSession {
            session_token,
            session_id,
            user_id: identity.sub,
        })
    }

    /// Refresh the IdP access token behind a session, rotating the
    /// stored refresh token when the IdP returns a new one.
    ///
    /// A refresh failure tears the session down; the caller must log in
    /// again rather than retry against a possibly revoked grant.
    ///
    /// # Errors
    ///
    /// See [`FlowError`].
    pub async fn refresh(
        &self,
        session_token: &str,
        client_ip: &str,
        client_fingerprint: &str,
        now: i64,
    ) -> Result<(), FlowError> {
        let claims = self
            .codec
            .verify(session_token, TokenKind::Access, now)
            .map_err(|_| FlowError::SessionNotFound)?;

        self.check_rate(&claims.sid, RateLimitAction::Refresh, now)?;

        let mut session = self
            .sessions
            .get(&claims.sid, client_ip, client_fingerprint, false, now)
            .await?
            .ok_or(FlowError::SessionNotFound)?;

        let Some(refresh_sealed) = session.refresh_token_sealed.as_deref() else {
            // Nothing to refresh with; force a new login.
            self.sessions.delete(&claims.sid).await?;
            return Err(FlowError::SessionNotFound);
        };
        let refresh_token = open_token(&self.sealing_key, refresh_sealed, &session.session_id)?;
        let refresh_token =
            String::from_utf8(refresh_token).map_err(|err| FlowError::Internal(err.into()))?;

        let tokens = match self.idp.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!(error = %err, "token refresh rejected, tearing down session");
                self.sessions.delete(&claims.sid).await?;
                return Err(FlowError::IdpExchange);
            }
        };

        session.access_token_sealed = seal_token(
            &self.sealing_key,
            tokens.access_token.as_bytes(),
            &session.session_id,
        )?;
        if let Some(rotated) = tokens.refresh_token.as_deref() {
            session.refresh_token_sealed = Some(seal_token(
                &self.sealing_key,
                rotated.as_bytes(),
                &session.session_id,
            )?);
        }
        session.access_token_expires_at = now + tokens.expires_in_seconds;
        session.last_activity = now;
        self.sessions.update(&session, now).await?;

        info!(user_id = session.user_id, "access token refreshed");
        Ok(())
    }

    /// Terminate a session and return the IdP logout URL.
    ///
    /// Best effort by design: a malformed token, a missing session, or a
    /// failed revocation never blocks logout. When the session fails its
    /// binding check the stored refresh token is NOT revoked, so a
    /// thief cannot use logout to destroy the real user's grant; the
    /// local record is deleted either way.
    pub async fn logout(
        &self,
        session_token: &str,
        client_ip: &str,
        client_fingerprint: &str,
        now: i64,
    ) -> Url {
        let logout_url = self.logout_url();

        let Ok(claims) = self.codec.verify(session_token, TokenKind::Access, now) else {
            return logout_url;
        };

        match self
            .sessions
            .get(&claims.sid, client_ip, client_fingerprint, false, now)
            .await
        {
            Ok(Some(session)) => {
                if let Some(sealed) = session.refresh_token_sealed.as_deref() {
                    match open_token(&self.sealing_key, sealed, &session.session_id) {
                        Ok(token) => {
                            let token = String::from_utf8_lossy(&token);
                            if let Err(err) = self.idp.revoke(&token).await {
                                warn!(error = %err, "refresh token revocation failed");
                            }
                        }
                        Err(err) => warn!(error = %err, "could not unseal refresh token"),
                    }
                }
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "session lookup failed during logout"),
        }

        if let Err(err) = self.sessions.delete(&claims.sid).await {
            warn!(error = %err, "session deletion failed during logout");
        }

        info!(user_id = claims.sub, "session terminated");
        logout_url
    }

    fn logout_url(&self) -> Url {
        let mut url = Url::parse(&format!("{}/v2/logout", self.config.idp_base_url()))
            .unwrap_or_else(|_| Url::parse("about:blank").expect("static url"));
        url.query_pairs_mut()
            .append_pair("client_id", self.config.client_id())
            .append_pair("returnTo", self.config.frontend_base_url());
        url
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}
