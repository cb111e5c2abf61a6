//! # Observability
//!
//! Structured logging is configured once in `runtime::initialization` via
//! `tracing-subscriber`; this module covers the two remaining ambient
//! concerns: Prometheus metrics and the HTTP health/metrics server that
//! exposes them.

pub mod metrics;
pub mod server;
