//! Logging initialization.
//!
//! The codebase logs through the `log` facade; the fmt collector from
//! tracing-subscriber picks those records up via its compat layer.
//! Filtering is controlled by RUST_LOG and defaults to `info`.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the global log collector.
///
/// # Returns
/// * `Ok(())` - Collector installed successfully
/// * `Err(anyhow::Error)` - A collector was already installed
pub fn init_logger() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}
