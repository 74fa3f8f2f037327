//! Tracing subscriber initialisation.
//!
//! The filter honours `RUST_LOG`; when it is unset the configured level is
//! used (e.g. `"info"` or `"debug,turnstile_effects=trace"`). Library code
//! only emits events and never calls this itself.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_types::{LogFormat, LoggingConfig, Result, TurnstileError};

/// Install the global subscriber.
///
/// # Errors
/// Returns [`TurnstileError::Configuration`] if the level does not parse or
/// a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            TurnstileError::Configuration(format!("invalid log level {:?}: {e}", config.level))
        })?,
    };

    let installed = match config.format {
        LogFormat::Human => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init(),
    };
    installed.map_err(|e| TurnstileError::Configuration(format!("tracing already initialised: {e}")))
}
