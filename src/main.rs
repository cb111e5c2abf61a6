//! # Trust Bundle Controller
//!
//! A cluster-scoped Kubernetes controller that materialises a declarative
//! `Bundle` resource into per-namespace `ConfigMap`/`Secret` targets.
//!
//! ## Overview
//!
//! 1. **Source resolution** — gathers PEM bytes from in-line values,
//!    `ConfigMap`/`Secret` objects (by name or label selector), and an
//!    optional default-CA package loaded from disk.
//! 2. **Canonicalisation** — parses, filters expired certificates,
//!    deduplicates, and orders them deterministically by DER-SHA-256.
//! 3. **Encoding** — re-emits PEM and, on request, JKS/PKCS#12 trust stores.
//! 4. **Fan-out** — applies the result as a `ConfigMap` and/or `Secret` in
//!    every namespace matching the bundle's label selector, using
//!    server-side apply with a stable field manager.
//!
//! ## Usage
//!
//! See [README.md](../README.md) for deployment instructions.

use anyhow::Result;
use trust_bundle_controller::runtime::initialization::initialize;
use trust_bundle_controller::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(
        init_result.bundles,
        init_result.reconciler,
        init_result.server_state,
    )
    .await?;

    Ok(())
}
