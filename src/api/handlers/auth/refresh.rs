//! Access-token refresh endpoint.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use super::session::{clear_session_cookie, extract_session_token};
use super::state::GatewayState;
use super::utils::{client_fingerprint, extract_client_ip};
use crate::flow::FlowError;
use crate::unix_now;

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    responses(
        (status = 204, description = "Access token refreshed"),
        (status = 401, description = "No valid session; cookie cleared", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh(headers: HeaderMap, state: Extension<Arc<GatewayState>>) -> impl IntoResponse {
    let Some(token) = extract_session_token(&headers) else {
        return unauthorized(&state);
    };

    let client_ip = extract_client_ip(&headers);
    let fingerprint = client_fingerprint(&headers);
    match state
        .flow()
        .refresh(&token, &client_ip, &fingerprint, unix_now())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(FlowError::RateLimitExceeded {
            retry_after_seconds,
        }) => {
            let mut response_headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                response_headers.insert("Retry-After", value);
            }
            (
                StatusCode::TOO_MANY_REQUESTS,
                response_headers,
                "Rate limited".to_string(),
            )
                .into_response()
        }
        Err(FlowError::Internal(err)) => {
            error!("Refresh failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        // SessionNotFound and IdpExchange both mean the session is gone.
        Err(_) => unauthorized(&state),
    }
}

fn unauthorized(state: &GatewayState) -> axum::response::Response {
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::UNAUTHORIZED,
        response_headers,
        "Unauthorized".to_string(),
    )
        .into_response()
}
