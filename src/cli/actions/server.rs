use crate::{
    api::{self, GatewayState},
    config::AuthConfig,
    flow::{FlowController, SessionGuard},
    idp::HttpIdpClient,
    pkce::StateStore,
    rate_limit::{RatePolicy, SlidingWindowLimiter},
    session::SessionStore,
    store::{MemoryStore, TtlStore},
    token::TokenCodec,
};
use anyhow::{Context, Result};
use rand::{rngs::OsRng, RngCore};
use rsa::{
    pkcs8::{EncodePrivateKey, LineEnding},
    RsaPrivateKey,
};
use secrecy::SecretString;
use std::{fs, sync::Arc};
use tracing::{info, warn};

const RATE_WINDOW_SECONDS: i64 = 60;
const SIGNING_KID: &str = "portiro-1";

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub idp_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub frontend_base_url: String,
    pub scope: Option<String>,
    pub absolute_timeout_seconds: i64,
    pub idle_timeout_seconds: i64,
    pub state_ttl_seconds: i64,
    pub callback_max_per_minute: usize,
    pub refresh_max_per_minute: usize,
    pub signing_key_path: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing key cannot be loaded or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let mut config = AuthConfig::new(
        args.idp_base_url,
        args.client_id.clone(),
        SecretString::from(args.client_secret),
        args.redirect_uri,
        args.frontend_base_url,
    )
    .with_absolute_timeout_seconds(args.absolute_timeout_seconds)
    .with_idle_timeout_seconds(args.idle_timeout_seconds)
    .with_state_ttl_seconds(args.state_ttl_seconds)
    .with_callback_max_per_minute(args.callback_max_per_minute)
    .with_refresh_max_per_minute(args.refresh_max_per_minute);
    if let Some(scope) = args.scope {
        config = config.with_scope(scope);
    }

    let signing_key_pem = match &args.signing_key_path {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read signing key: {path}"))?
        }
        None => {
            // Ephemeral key: sessions die with the process, which matches
            // the in-memory stores below.
            warn!("No signing key configured, generating an ephemeral RSA key");
            let key = RsaPrivateKey::new(&mut OsRng, 2048)
                .context("Failed to generate the signing key")?;
            key.to_pkcs8_pem(LineEnding::LF)
                .context("Failed to encode the signing key")?
                .as_bytes()
                .to_vec()
        }
    };
    let codec = Arc::new(
        TokenCodec::from_private_key_pem_or_der(
            &signing_key_pem,
            SIGNING_KID,
            "portiro",
            args.client_id,
        )
        .context("Failed to build the token codec")?,
    );

    let mut sealing_key = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut sealing_key)
        .context("Failed to generate the sealing key")?;

    let store: Arc<dyn TtlStore> = Arc::new(MemoryStore::new());
    let sessions = Arc::new(SessionStore::new(
        store.clone(),
        config.idle_timeout_seconds(),
        config.absolute_timeout_seconds(),
    ));
    let limiter = Arc::new(SlidingWindowLimiter::new(
        RatePolicy {
            max_requests: config.callback_max_per_minute(),
            window_seconds: RATE_WINDOW_SECONDS,
        },
        RatePolicy {
            max_requests: config.refresh_max_per_minute(),
            window_seconds: RATE_WINDOW_SECONDS,
        },
    ));
    let idp = Arc::new(HttpIdpClient::new(&config).context("Failed to build the IdP client")?);

    let refresh_threshold_seconds = config.refresh_threshold_seconds();
    let flow = FlowController::new(
        StateStore::new(store),
        sessions.clone(),
        codec.clone(),
        limiter,
        idp,
        config,
        sealing_key,
    );
    let guard = SessionGuard::new(sessions, codec, refresh_threshold_seconds);

    info!("Starting the authentication gateway");
    api::serve(args.port, Arc::new(GatewayState::new(flow, guard))).await
}
