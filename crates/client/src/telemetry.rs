//! Tracing bootstrap for hosts without their own subscriber.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "quarry=info";

/// Installs a formatting subscriber filtered by `RUST_LOG` (default `quarry=info`).
///
/// Returns `false` when a global subscriber was already installed; calling it twice is harmless.
pub fn init() -> bool {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
	let installed = tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok();
	if installed {
		tracing::debug!(default_filter = DEFAULT_FILTER, "telemetry.init");
	}
	installed
}
