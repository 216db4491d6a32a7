use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "murmur_client=debug,murmur_store=info,warn";

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the default
/// filter. Does nothing if a subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Starting {} core", murmur_shared::constants::APP_NAME);
    }
}
