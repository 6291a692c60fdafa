//! # Portiro (OAuth2 PKCE Authentication Gateway)
//!
//! `portiro` fronts a web application with an OAuth2
//! Authorization-Code-with-PKCE login flow against an external identity
//! provider, and owns the full session lifecycle that results from it.
//!
//! ## Login flow
//!
//! Login initiation generates a PKCE verifier/challenge pair plus
//! single-use `state` and `nonce` values and redirects the browser to the
//! IdP. The callback consumes the state record (atomic fetch-and-delete,
//! so a captured callback URL cannot be replayed), exchanges the
//! authorization code together with the stored verifier, validates the
//! returned identity token (signature, issuer, audience, nonce), and
//! only then creates a session.
//!
//! ## Sessions
//!
//! - **Binding:** every session is tied to the client IP and a hashed
//!   user-agent fingerprint captured at creation. A mismatch on any read
//!   invalidates and deletes the record.
//! - **Idle timeout:** activity-resettable expiry window.
//! - **Absolute ceiling:** a hard lifetime limit from creation. Storage
//!   TTLs are always set to the *remaining* absolute budget, so
//!   continuous activity can never extend a session past the ceiling.
//! - **Refresh rotation:** the IdP rotates the refresh token on every
//!   refresh; the replaced token is never reusable.
//!
//! The IdP access/refresh/identity tokens are sealed at rest and are
//! never exposed to the UI layer: the session endpoint returns a
//! read-only identity view that structurally carries no token fields.

pub mod api;
pub mod cli;
pub mod config;
pub mod flow;
pub mod idp;
pub mod pkce;
pub mod rate_limit;
pub mod session;
pub mod store;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Current unix time in seconds.
///
/// Time-sensitive operations (token verification, session expiry, rate
/// limiting) take `now` explicitly so tests never sleep; request
/// handlers use this to supply it.
#[must_use]
pub fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_unix_now_is_recent() {
        // 2023-01-01 as a floor; catches a zeroed clock or unit mixups.
        assert!(unix_now() > 1_672_531_200);
    }
}
