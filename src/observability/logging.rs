//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber for the binary
//! - Resolve the log filter from the environment, falling back to config
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level so operators can override
//!   without touching the config file
//! - Installing twice is not an error; the second call is ignored

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the fmt subscriber. `default_level` is used when `RUST_LOG` is unset,
/// e.g. `"info"` or `"waypoint=debug"`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}
