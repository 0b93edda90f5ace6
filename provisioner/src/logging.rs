//! Tracing setup for provisioning runs.
//!
//! Progress and diagnostics go to stderr so stdout carries only the command's
//! product output (version string, plan, report).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` so image build logs show each step.
///
/// # Example
/// ```bash
/// RUST_LOG=provisioner=debug provisioner run
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
