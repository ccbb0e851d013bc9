//! # pong-logging
//!
//! Installs the global `tracing` subscriber.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from
//! [`LoggingSettings::filter_directives`]. Output is either human-readable or
//! one JSON object per line.

#![deny(unsafe_code)]

use pong_settings::LoggingSettings;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Errors from [`init_logging`].
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The configured directives could not be parsed.
    #[error("invalid log filter `{directives}`: {source}")]
    InvalidFilter {
        /// Directive string that failed.
        directives: String,
        /// Parser error.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the level filter: `RUST_LOG` wins over the configured directives.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = settings.filter_directives();
    EnvFilter::try_new(&directives).map_err(|source| LoggingError::InvalidFilter {
        directives,
        source,
    })
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = build_filter(settings)?;

    let layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(filter)
            .boxed()
    };

    tracing_subscriber::registry().with(layer).try_init()?;
    Ok(())
}
