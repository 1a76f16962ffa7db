//! Subscriber setup for the `tracing` output of scopes and pipelines.

use crate::errors::ConfigError;
use crate::pipeline::LogConfig;
use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if the level is not a valid directive.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| ConfigError::Invalid(format!("log level '{}': {e}", config.level)))
}

/// Installs the global subscriber.
///
/// Returns `false` if another subscriber was already installed, which is
/// not an error: tests and embedding hosts commonly install their own.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if the level is not a valid directive.
pub fn init_tracing(config: &LogConfig) -> Result<bool, ConfigError> {
    let filter = env_filter(config)?;
    let installed = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
            .is_ok()
    };
    Ok(installed)
}
