//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured level when set.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Calling it again after a subscriber is
/// installed is a no-op.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = config.log_level.as_str().to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .map_err(|e| ProtocolError::ConfigError(format!("Invalid log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_format {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    };

    if installed.is_ok() {
        info!(app = %config.app_name, level = %level, json = config.json_format, "Logging initialized");
    }
    Ok(())
}
