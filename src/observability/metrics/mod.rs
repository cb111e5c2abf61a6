//! # Metrics
//!
//! Prometheus instrumentation for the reconciliation loop. Metrics are
//! process-global `LazyLock` statics registered once into
//! [`registry::REGISTRY`] — the one deliberately process-wide, read-mostly
//! piece of shared state in this crate.

pub mod bundle_metrics;
pub mod registry;

pub use bundle_metrics::*;
pub use registry::REGISTRY;

use anyhow::Result;

/// Register every metric family with the global registry. Called once,
/// during startup.
pub fn register_metrics() -> Result<()> {
    bundle_metrics::register_bundle_metrics()
}
