//! Log subscriber setup for the binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! whoever embeds it. The CLI calls [`init_logging`] once at startup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_DIRECTIVE: &str = "pdp_ingest=info";

/// Install a global subscriber writing to stderr.
///
/// `RUST_LOG` overrides the default `pdp_ingest=info` filter. With `json` set,
/// events are emitted as one JSON object per line.
pub fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
