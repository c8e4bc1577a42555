//! Tracing subscriber setup for hosts embedding the engine.

use anvil_core::Result;
use std::fs::{OpenOptions, create_dir_all};
use std::io::stderr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "anvil_engine=info,anvil_core=info";

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Installs a stderr subscriber honouring `RUST_LOG`, falling back to `default_filter`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    Registry::default()
        .with(env_filter(default_filter))
        .with(
            fmt::layer()
                .with_writer(stderr)
                .with_target(true)
                .with_level(true),
        )
        .try_init()
        .is_ok()
}

/// Installs a subscriber appending plain-text logs to `path`.
///
/// Returns `false` when a global subscriber was already installed.
///
/// # Errors
/// Returns an error if the log file cannot be opened.
pub fn init_file_logging(path: &Path, default_filter: &str) -> Result<bool> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(Registry::default()
        .with(env_filter(default_filter))
        .with(
            fmt::layer()
                .with_writer(Arc::new(log_file))
                .with_ansi(false)
                .with_target(true)
                .with_level(true),
        )
        .try_init()
        .is_ok())
}
