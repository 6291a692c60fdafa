//! Authorization-code callback endpoint.

use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

use super::session::session_cookie;
use super::state::GatewayState;
use super::utils::{client_fingerprint, extract_client_ip};
use crate::flow::FlowError;
use crate::unix_now;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    /// Set by the IdP when the user denied consent or the request failed.
    error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/auth/callback",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "Anti-forgery state")
    ),
    responses(
        (status = 303, description = "Session established, redirect to the frontend"),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn callback(
    headers: HeaderMap,
    state: Extension<Arc<GatewayState>>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    // Denials and malformed redirects restart the flow instead of
    // surfacing an error page the gateway cannot style.
    if let Some(idp_error) = query.error.as_deref() {
        warn!(idp_error, "identity provider returned an error");
        return restart_login();
    }
    let (Some(code), Some(auth_state)) = (query.code.as_deref(), query.state.as_deref()) else {
        return restart_login();
    };

    let client_ip = extract_client_ip(&headers);
    let fingerprint = client_fingerprint(&headers);
    let established = match state
        .flow()
        .callback(code, auth_state, &client_ip, &fingerprint, unix_now())
        .await
    {
        Ok(established) => established,
        Err(FlowError::RateLimitExceeded {
            retry_after_seconds,
        }) => {
            return rate_limited(retry_after_seconds);
        }
        Err(err) => {
            warn!("Callback rejected: {err}");
            return restart_login();
        }
    };

    let Ok(cookie) = session_cookie(&state, &established.session_token) else {
        error!("Failed to build session cookie");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);

    (
        response_headers,
        Redirect::to(state.config().frontend_base_url()),
    )
        .into_response()
}

fn restart_login() -> axum::response::Response {
    Redirect::to("/v1/auth/login").into_response()
}

fn rate_limited(retry_after_seconds: u64) -> axum::response::Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
        headers.insert("Retry-After", value);
    }
    (
        StatusCode::TOO_MANY_REQUESTS,
        headers,
        "Rate limited".to_string(),
    )
        .into_response()
}
