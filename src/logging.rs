//! Tracing setup shared by the server and the log generator.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is not set
pub fn default_directives(level: &str) -> String {
    format!("sublog={level},sublog_loggen={level},tower_http={level}")
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level. Format is `json` or anything
/// else for the human-readable layout.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}
