//! Tracing setup.
//!
//! The subscriber is installed before the configuration is read, at `info`
//! or whatever `RUST_LOG` says. The configured level is swapped in later
//! through the reload handle.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER_HANDLE.set(handle);
    }
}

/// Switches to the configured level. `RUST_LOG` wins when set.
pub fn apply_logging_level(logging: &LoggingConfig) {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    if let Err(e) = handle.reload(EnvFilter::new(&logging.level)) {
        tracing::warn!(error = %e, level = %logging.level, "Failed to apply logging level");
    }
}
