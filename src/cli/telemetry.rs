//! Logging setup.
//!
//! `RUST_LOG` wins when set; otherwise the `-v` count picks the level.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(verbosity: Option<Level>) -> Result<()> {
    let filter = match verbosity {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
    };

    Registry::default()
        .with(filter)
        .with(fmt::layer())
        .try_init()?;

    Ok(())
}
