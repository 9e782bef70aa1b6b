//! Process-wide logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "cutover_cli=info,cutover_engine=info,cutover_storage=info,warn";

/// Install a JSON subscriber on stderr, filtered by `RUST_LOG`.
///
/// Stdout is left for the report document.
pub fn init_tracing() -> Result<(), String> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| format!("Failed to init subscriber: {}", e))
}
