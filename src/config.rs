//! Gateway configuration.
//!
//! Every knob is an explicit field here; nothing reads the environment
//! at runtime. The CLI layer populates this from flags/env once at
//! startup and hands it to the components that need it.

use secrecy::SecretString;

const DEFAULT_ABSOLUTE_TIMEOUT_SECONDS: i64 = 4 * 60 * 60;
const DEFAULT_IDLE_TIMEOUT_SECONDS: i64 = 30 * 60;
const DEFAULT_STATE_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_IDP_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_REFRESH_THRESHOLD_SECONDS: i64 = 10 * 60;
const DEFAULT_CALLBACK_MAX_PER_MINUTE: usize = 10;
const DEFAULT_REFRESH_MAX_PER_MINUTE: usize = 5;
const DEFAULT_SCOPE: &str = "openid profile email offline_access";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    idp_base_url: String,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    frontend_base_url: String,
    scope: String,
    absolute_timeout_seconds: i64,
    idle_timeout_seconds: i64,
    state_ttl_seconds: i64,
    idp_timeout_seconds: u64,
    refresh_threshold_seconds: i64,
    callback_max_per_minute: usize,
    refresh_max_per_minute: usize,
}

impl AuthConfig {
    #[must_use]
    pub fn new(
        idp_base_url: String,
        client_id: String,
        client_secret: SecretString,
        redirect_uri: String,
        frontend_base_url: String,
    ) -> Self {
        Self {
            idp_base_url: idp_base_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
            redirect_uri,
            frontend_base_url,
            scope: DEFAULT_SCOPE.to_string(),
            absolute_timeout_seconds: DEFAULT_ABSOLUTE_TIMEOUT_SECONDS,
            idle_timeout_seconds: DEFAULT_IDLE_TIMEOUT_SECONDS,
            state_ttl_seconds: DEFAULT_STATE_TTL_SECONDS,
            idp_timeout_seconds: DEFAULT_IDP_TIMEOUT_SECONDS,
            refresh_threshold_seconds: DEFAULT_REFRESH_THRESHOLD_SECONDS,
            callback_max_per_minute: DEFAULT_CALLBACK_MAX_PER_MINUTE,
            refresh_max_per_minute: DEFAULT_REFRESH_MAX_PER_MINUTE,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: String) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_absolute_timeout_seconds(mut self, seconds: i64) -> Self {
        self.absolute_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_idle_timeout_seconds(mut self, seconds: i64) -> Self {
        self.idle_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_state_ttl_seconds(mut self, seconds: i64) -> Self {
        // The login-initiation window is capped at ten minutes.
        self.state_ttl_seconds = seconds.min(DEFAULT_STATE_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_idp_timeout_seconds(mut self, seconds: u64) -> Self {
        self.idp_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_threshold_seconds(mut self, seconds: i64) -> Self {
        self.refresh_threshold_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_callback_max_per_minute(mut self, max: usize) -> Self {
        self.callback_max_per_minute = max;
        self
    }

    #[must_use]
    pub fn with_refresh_max_per_minute(mut self, max: usize) -> Self {
        self.refresh_max_per_minute = max;
        self
    }

    #[must_use]
    pub fn idp_base_url(&self) -> &str {
        &self.idp_base_url
    }

    /// Expected issuer for identity-token validation.
    #[must_use]
    pub fn expected_issuer(&self) -> String {
        format!("{}/", self.idp_base_url)
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn absolute_timeout_seconds(&self) -> i64 {
        self.absolute_timeout_seconds
    }

    #[must_use]
    pub fn idle_timeout_seconds(&self) -> i64 {
        self.idle_timeout_seconds
    }

    #[must_use]
    pub fn state_ttl_seconds(&self) -> i64 {
        self.state_ttl_seconds
    }

    #[must_use]
    pub fn idp_timeout_seconds(&self) -> u64 {
        self.idp_timeout_seconds
    }

    #[must_use]
    pub fn refresh_threshold_seconds(&self) -> i64 {
        self.refresh_threshold_seconds
    }

    #[must_use]
    pub fn callback_max_per_minute(&self) -> usize {
        self.callback_max_per_minute
    }

    #[must_use]
    pub fn refresh_max_per_minute(&self) -> usize {
        self.refresh_max_per_minute
    }

    /// Only mark session cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig::new(
        "https://idp.example.test".to_string(),
        "client-123".to_string(),
        SecretString::from("s3cret".to_string()),
        "https://app.example.test/v1/auth/callback".to_string(),
        "https://app.example.test".to_string(),
    )
}
