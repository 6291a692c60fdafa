//! Login initiation endpoint.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use std::sync::Arc;
use tracing::error;

use super::state::GatewayState;
use crate::unix_now;

#[utoipa::path(
    get,
    path = "/v1/auth/login",
    responses(
        (status = 307, description = "Redirect to the identity provider"),
        (status = 500, description = "Could not start the flow", body = String)
    ),
    tag = "auth"
)]
pub async fn login(state: Extension<Arc<GatewayState>>) -> impl IntoResponse {
    match state.flow().login(unix_now()).await {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(err) => {
            error!("Failed to start login flow: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login unavailable".to_string(),
            )
                .into_response()
        }
    }
}
