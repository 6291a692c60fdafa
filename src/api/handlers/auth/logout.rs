//! Logout endpoint.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::session::{clear_session_cookie, extract_session_token};
use super::state::GatewayState;
use super::types::LogoutResponse;
use super::utils::{client_fingerprint, extract_client_ip};
use crate::unix_now;

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Session cleared; visit the returned URL to end the IdP session", body = LogoutResponse)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<GatewayState>>) -> impl IntoResponse {
    let token = extract_session_token(&headers).unwrap_or_default();
    let client_ip = extract_client_ip(&headers);
    let fingerprint = client_fingerprint(&headers);

    // Never fails: a missing or garbage token still yields the IdP
    // logout URL so the browser can finish signing out upstream.
    let logout_url = state
        .flow()
        .logout(&token, &client_ip, &fingerprint, unix_now())
        .await;

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    match clear_session_cookie(&state) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build clear cookie: {err}"),
    }

    (
        StatusCode::OK,
        response_headers,
        Json(LogoutResponse {
            logout_url: logout_url.to_string(),
        }),
    )
        .into_response()
}
