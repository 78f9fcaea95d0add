//! Console logging setup for the binary.
//!
//! The library only emits `tracing` events; installing a subscriber is
//! left to whoever embeds it.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to `default_level` when the variable is unset or invalid.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_logging(default_level: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        );

        // Another global subscriber may already be installed by the embedder
        if subscriber.with(filter).try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}
