//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the binary
//! - Derive the default filter from the configured log level
//!
//! # Design Decisions
//! - `RUST_LOG` always wins over the configuration file
//! - Library code only emits events; installing a subscriber is the caller's choice

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogLevel;

/// Filter used when neither `RUST_LOG` nor the configuration sets a level.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Build the filter directive for a configured level.
pub fn directive_for(level: Option<LogLevel>) -> String {
    let level = level.map_or(DEFAULT_DIRECTIVE, LogLevel::as_directive);
    format!("connector_config={level},{level}")
}

/// Install the global subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn init(level: Option<LogLevel>) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_for_level() {
        assert_eq!(directive_for(None), "connector_config=info,info");
        assert_eq!(
            directive_for(Some(LogLevel::Warning)),
            "connector_config=warn,warn"
        );
    }
}
