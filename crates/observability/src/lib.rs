//! Process-wide logging setup shared by every binary in the workspace.

/// Tracing subscriber configuration.
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize structured logging with the workspace defaults.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init() {
    tracing::init(LogFormat::from_env(), "info");
}
