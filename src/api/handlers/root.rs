use axum::response::IntoResponse;

// Undocumented on purpose; load balancers and humans poke `/`.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn root_names_the_service() {
        let response = root().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        assert!(String::from_utf8_lossy(&bytes).contains(env!("CARGO_PKG_NAME")));
    }
}
