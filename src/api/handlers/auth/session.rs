//! Session endpoint plus the cookie helpers shared by the auth handlers.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::state::GatewayState;
use super::types::IdentityView;
use super::utils::{client_fingerprint, extract_client_ip};
use crate::unix_now;

const SESSION_COOKIE_NAME: &str = "portiro_session";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = IdentityView),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    state: Extension<Arc<GatewayState>>,
) -> impl IntoResponse {
    // Missing cookies are treated as "no session" to avoid leaking auth state.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let client_ip = extract_client_ip(&headers);
    let fingerprint = client_fingerprint(&headers);
    match state
        .guard()
        .identity_for(&token, &client_ip, &fingerprint, unix_now())
        .await
    {
        Ok(Some(identity)) => (StatusCode::OK, Json(identity)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    state: &GatewayState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = state.config().absolute_timeout_seconds();
    // Only mark cookies secure when the frontend is served over HTTPS.
    let secure = state.config().session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(
    state: &GatewayState,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = state.config().session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        // Skip malformed pairs; a valid session cookie may follow them.
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        if key.trim() == SESSION_COOKIE_NAME {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_token_extracted_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; portiro_session=tok-1; theme=dark"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok-1"));
    }

    #[test]
    fn malformed_pair_does_not_hide_later_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("garbage; portiro_session=tok-3"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok-3"));
    }

    #[test]
    fn bearer_token_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok-2"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok-2"));
    }

    #[test]
    fn empty_bearer_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_session_token(&headers).is_none());
    }

    #[test]
    fn no_headers_is_none() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());
    }
}
