//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Honor the configured verbosity, with `RUST_LOG` taking precedence
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - Destination is stderr; anything fancier belongs to the deployment

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging subsystem.
///
/// `level` is the configured verbosity (trace, debug, info, warn, error).
/// An explicit `RUST_LOG` environment filter overrides it.
pub fn init(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
