//! Tracing setup
//!
//! Agents log from their own worker threads, so the fmt layer prints thread
//! names (`agent-<name>`) next to the target.

use crate::{GrantFlowError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber with [`DEFAULT_FILTER`]
///
/// Useful `RUST_LOG` values:
/// - `info`: agent start/stop, task lifecycle, pipeline stages
/// - `grantflow::mail=debug`: every send and receive
/// - `grantflow=debug,groq=info`: per-crate levels
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init() -> Result<()> {
    init_with_default(DEFAULT_FILTER)
}

/// Install the global subscriber, falling back to `default` when `RUST_LOG` is unset
pub fn init_with_default(default: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(default)?)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| GrantFlowError::Other(format!("Failed to initialize tracing: {}", e)))
}

/// `RUST_LOG` if set, otherwise the `default` directive
pub fn env_filter(default: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default)
            .map_err(|e| GrantFlowError::Config(format!("Invalid log filter '{}': {}", default, e))),
    }
}

/// Install logging for tests, ignoring an already-installed subscriber
pub fn init_test() {
    let _ = init_with_default("debug");
}
