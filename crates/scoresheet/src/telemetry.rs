//! Tracing setup for embedding applications.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. Call once at startup; honours
/// `RUST_LOG`, falling back to `default_filter`.
///
/// `log` records (the worker pool logs through `log`) are picked up by the
/// subscriber's own bridge, which `try_init` installs; setting up a separate
/// `LogTracer` here would make that installation fail.
pub fn init_tracing(
    default_filter: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().try_init()?;
    } else {
        builder.try_init()?;
    }
    Ok(())
}
