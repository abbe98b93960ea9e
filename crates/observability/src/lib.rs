//! Process-wide tracing/logging setup.

pub mod tracing;

pub use tracing::{LogFormat, ObservabilityConfig};

/// Initialize tracing with defaults (JSON, `RUST_LOG` or `info`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(&ObservabilityConfig::default());
}

/// Initialize tracing with an explicit configuration.
pub fn init_with(config: &ObservabilityConfig) {
    tracing::init(config);
}
