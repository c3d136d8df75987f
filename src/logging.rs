//! Structured logging setup.
//!
//! Environment-aware tracing initialization. Level selection goes through
//! `RUST_LOG`; when unset the crate defaults to `info` with inventory
//! internals at `debug`.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber. Safe to call more than once;
/// only the first call has an effect.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,cluster_inventory=debug"));

        // A subscriber may already be installed by the embedding binary;
        // try_init keeps that one in place.
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .try_init();
    });
}
