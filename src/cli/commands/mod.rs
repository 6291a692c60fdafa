pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("portiro")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PORTIRO_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("idp-base-url")
                .long("idp-base-url")
                .help("Identity provider base URL, e.g. https://tenant.auth.example")
                .env("PORTIRO_IDP_BASE_URL")
                .required(true),
        )
        .arg(
            Arg::new("client-id")
                .long("client-id")
                .help("OAuth2 client id registered with the identity provider")
                .env("PORTIRO_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new("client-secret")
                .long("client-secret")
                .help("OAuth2 client secret")
                .env("PORTIRO_CLIENT_SECRET")
                .required(true)
                .hide_env_values(true),
        )
        .arg(
            Arg::new("redirect-uri")
                .long("redirect-uri")
                .help("Callback URI registered with the identity provider")
                .env("PORTIRO_REDIRECT_URI")
                .required(true),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend origin users land on after login")
                .env("PORTIRO_FRONTEND_BASE_URL")
                .required(true),
        )
        .arg(
            Arg::new("scope")
                .long("scope")
                .help("OAuth2 scopes requested at login")
                .env("PORTIRO_SCOPE"),
        )
        .arg(
            Arg::new("absolute-timeout")
                .long("absolute-timeout")
                .help("Hard session lifetime ceiling in seconds")
                .default_value("14400")
                .env("PORTIRO_ABSOLUTE_TIMEOUT")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("idle-timeout")
                .long("idle-timeout")
                .help("Idle session timeout in seconds")
                .default_value("1800")
                .env("PORTIRO_IDLE_TIMEOUT")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("state-ttl")
                .long("state-ttl")
                .help("Login initiation window in seconds (capped at 600)")
                .default_value("600")
                .env("PORTIRO_STATE_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("callback-rate-limit")
                .long("callback-rate-limit")
                .help("Callback attempts allowed per client IP per minute")
                .default_value("10")
                .env("PORTIRO_CALLBACK_RATE_LIMIT")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("refresh-rate-limit")
                .long("refresh-rate-limit")
                .help("Refresh attempts allowed per session per minute")
                .default_value("5")
                .env("PORTIRO_REFRESH_RATE_LIMIT")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("signing-key-path")
                .long("signing-key-path")
                .help("RSA private key (PEM) for gateway session tokens; generated at startup when omitted")
                .env("PORTIRO_SIGNING_KEY_PATH"),
        );

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 11] = [
        "portiro",
        "--idp-base-url",
        "https://tenant.auth.example",
        "--client-id",
        "client-123",
        "--client-secret",
        "s3cret",
        "--redirect-uri",
        "https://gw.example.test/v1/auth/callback",
        "--frontend-base-url",
        "https://app.example.test",
    ];

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "portiro");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        let matches = new().get_matches_from(REQUIRED);
        assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
        assert_eq!(
            matches.get_one::<i64>("absolute-timeout").copied(),
            Some(14400)
        );
        assert_eq!(matches.get_one::<i64>("idle-timeout").copied(), Some(1800));
        assert_eq!(matches.get_one::<i64>("state-ttl").copied(), Some(600));
        assert_eq!(
            matches.get_one::<usize>("callback-rate-limit").copied(),
            Some(10)
        );
        assert_eq!(
            matches.get_one::<usize>("refresh-rate-limit").copied(),
            Some(5)
        );
    }

    #[test]
    fn test_missing_required_args() {
        assert!(new().try_get_matches_from(["portiro"]).is_err());
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("PORTIRO_PORT", Some("9090")),
                ("PORTIRO_IDP_BASE_URL", Some("https://tenant.auth.example")),
                ("PORTIRO_CLIENT_ID", Some("client-env")),
                ("PORTIRO_CLIENT_SECRET", Some("s3cret")),
                (
                    "PORTIRO_REDIRECT_URI",
                    Some("https://gw.example.test/v1/auth/callback"),
                ),
                (
                    "PORTIRO_FRONTEND_BASE_URL",
                    Some("https://app.example.test"),
                ),
                ("PORTIRO_IDLE_TIMEOUT", Some("900")),
            ],
            || {
                let matches = new().get_matches_from(["portiro"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(9090));
                assert_eq!(
                    matches.get_one::<String>("client-id").cloned(),
                    Some("client-env".to_string())
                );
                assert_eq!(matches.get_one::<i64>("idle-timeout").copied(), Some(900));
            },
        );
    }
}
