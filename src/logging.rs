//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging for the backend.
//! Integrates with the tracing ecosystem for structured event logging.

use crate::config::LoggingConfig;
use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Errors
///
/// Returns an error if the configured filter directive is invalid or a
/// global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use rentaldesk::config::LoggingConfig;
/// use rentaldesk::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "rentaldesk=info".to_string(),
///     json_format: true,
/// };
///
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .try_init()?;
    }

    Ok(())
}
