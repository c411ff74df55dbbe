//! Optional logging bootstrap.
//!
//! docgate only emits `tracing` events; installing a subscriber is left to the
//! application. [`init`] is a convenience for applications that want the
//! connection URI's `logLevel` to drive a plain console subscriber.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise `level` is used, falling
/// back to `info`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(level: Option<LevelFilter>) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(LevelFilter::INFO).to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
