//! Identity provider collaborator.
//!
//! The IdP is external and possibly slow or unavailable; every call
//! carries an explicit timeout and failures surface as errors rather
//! than being retried here. The trait boundary lets tests stand in a
//! stub provider.

mod id_token;

pub use id_token::{verify_id_token, IdTokenClaims};

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

use crate::config::AuthConfig;
use crate::token::Jwks;

#[derive(Debug, Error)]
pub enum IdpError {
    #[error("idp request failed")]
    Http(#[from] reqwest::Error),
    #[error("idp returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid idp url")]
    Url(#[from] url::ParseError),
    #[error("invalid jwks document")]
    Jwks(#[from] serde_json::Error),
}

/// Token endpoint response, for both code exchange and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(rename = "expires_in")]
    pub expires_in_seconds: i64,
}

#[async_trait]
pub trait IdpClient: Send + Sync {
    /// Exchange an authorization code plus PKCE verifier for tokens.
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse, IdpError>;

    /// Exchange a refresh token for fresh tokens. The IdP is expected to
    /// rotate the refresh token on every call.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, IdpError>;

    /// Revoke a refresh token.
    async fn revoke(&self, refresh_token: &str) -> Result<(), IdpError>;

    /// Public key set for identity-token signature verification.
    async fn jwks(&self) -> Result<Jwks, IdpError>;
}

/// HTTP client against a real IdP.
pub struct HttpIdpClient {
    http: reqwest::Client,
    base_url: Url,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    // The key set changes rarely; fetch once and reuse.
    cached_jwks: Mutex<Option<Jwks>>,
}

impl HttpIdpClient {
    /// Build a client from the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the IdP base URL is invalid or the HTTP
    /// client cannot be constructed.
    pub fn new(config: &AuthConfig) -> Result<Self, IdpError> {
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(config.idp_timeout_seconds()))
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(config.idp_base_url())?,
            client_id: config.client_id().to_string(),
            client_secret: config.client_secret().clone(),
            redirect_uri: config.redirect_uri().to_string(),
            cached_jwks: Mutex::new(None),
        })
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, IdpError> {
        let url = self.base_url.join("/oauth/token")?;
        let response = self.http.post(url).form(form).send().await?;
        if !response.status().is_success() {
            return Err(IdpError::Status {
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl IdpClient for HttpIdpClient {
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse, IdpError> {
        self.post_token(&[
            ("grant_type", "authorization_code"),
            ("client_id", &self.client_id),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, IdpError> {
        self.post_token(&[
            ("grant_type", "refresh_token"),
            ("client_id", &self.client_id),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), IdpError> {
        let url = self.base_url.join("/oauth/revoke")?;
        let response = self
            .http
            .post(url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("token", refresh_token),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IdpError::Status {
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn jwks(&self) -> Result<Jwks, IdpError> {
        let mut cached = self.cached_jwks.lock().await;
        if let Some(jwks) = cached.as_ref() {
            return Ok(jwks.clone());
        }

        let url = self.base_url.join("/.well-known/jwks.json")?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(IdpError::Status {
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body = response.text().await?;
        let jwks = Jwks::from_json(&body)?;
        *cached = Some(jwks.clone());
        Ok(jwks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn token_response_parses_optional_fields() -> Result<(), serde_json::Error> {
        let full: TokenResponse = serde_json::from_str(
            r#"{"access_token":"at","refresh_token":"rt","id_token":"it","expires_in":3600}"#,
        )?;
        assert_eq!(full.access_token, "at");
        assert_eq!(full.refresh_token.as_deref(), Some("rt"));
        assert_eq!(full.id_token.as_deref(), Some("it"));
        assert_eq!(full.expires_in_seconds, 3600);

        // Refresh responses may omit rotation and id token.
        let minimal: TokenResponse =
            serde_json::from_str(r#"{"access_token":"at","expires_in":60}"#)?;
        assert!(minimal.refresh_token.is_none());
        assert!(minimal.id_token.is_none());
        Ok(())
    }

    #[test]
    fn http_client_builds_from_config() {
        assert!(HttpIdpClient::new(&test_config()).is_ok());
    }
}
