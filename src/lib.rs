//! Trust Bundle Controller Library
//!
//! Core library for a cluster-scoped controller that materialises a
//! declarative trust `Bundle` into per-namespace `ConfigMap`/`Secret`
//! targets. Tests live alongside the modules they cover.

pub mod certpool;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod defaultca;
pub mod error;
pub mod observability;
pub mod runtime;
pub mod selector;
pub mod source;
pub mod target;
pub mod truststore;

// Re-export CRD types at the crate root for convenience.
pub use crd::*;
