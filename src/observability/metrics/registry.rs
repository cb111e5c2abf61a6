//! # Metrics Registry
//!
//! A single process-wide `prometheus::Registry` every metric family
//! registers into, and the exposition helper the metrics HTTP endpoint uses
//! to render it.

use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::LazyLock;

/// The process-wide metrics registry.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Render the current state of every registered metric family in the
/// Prometheus text exposition format.
pub fn gather() -> String {
    let metric_families = REGISTRY.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
