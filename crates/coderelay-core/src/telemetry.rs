//! Tracing setup shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, honoring `RUST_LOG` and falling back to
/// `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init();
}
