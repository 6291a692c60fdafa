use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let required = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .cloned()
            .with_context(|| format!("missing required argument: --{name}"))
    };

    Ok(Action::Server(Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        idp_base_url: required("idp-base-url")?,
        client_id: required("client-id")?,
        client_secret: required("client-secret")?,
        redirect_uri: required("redirect-uri")?,
        frontend_base_url: required("frontend-base-url")?,
        scope: matches.get_one::<String>("scope").cloned(),
        absolute_timeout_seconds: matches
            .get_one::<i64>("absolute-timeout")
            .copied()
            .unwrap_or(14_400),
        idle_timeout_seconds: matches
            .get_one::<i64>("idle-timeout")
            .copied()
            .unwrap_or(1800),
        state_ttl_seconds: matches.get_one::<i64>("state-ttl").copied().unwrap_or(600),
        callback_max_per_minute: matches
            .get_one::<usize>("callback-rate-limit")
            .copied()
            .unwrap_or(10),
        refresh_max_per_minute: matches
            .get_one::<usize>("refresh-rate-limit")
            .copied()
            .unwrap_or(5),
        signing_key_path: matches.get_one::<String>("signing-key-path").cloned(),
    }))
}
