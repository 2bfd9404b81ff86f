//! Logging initialization and configuration.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system with tracing.
///
/// Sets up tracing-subscriber with environment-based filtering (`RUST_LOG`)
/// and a compact formatter. The default filter keeps third-party crates at
/// `info` while the engine crates log at `debug`.
///
/// # Example
/// ```
/// prism_core::init_logging();
/// tracing::info!("engine starting");
/// ```
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,prism=debug,prism_vulkan=debug,prism_render=debug")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
