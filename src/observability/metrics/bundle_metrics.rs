//! # Bundle Reconciliation Metrics

use super::registry::REGISTRY;
use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};
use std::sync::LazyLock;

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "trust_bundle_reconciliations_total",
        "Total number of bundle reconciliations attempted",
    )
    .expect("failed to create trust_bundle_reconciliations_total metric")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "trust_bundle_reconciliation_errors_total",
        "Total number of bundle reconciliations that returned an error",
    )
    .expect("failed to create trust_bundle_reconciliation_errors_total metric")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "trust_bundle_reconciliation_duration_seconds",
            "Duration of a single bundle reconciliation",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("failed to create trust_bundle_reconciliation_duration_seconds metric")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trust_bundle_requeues_total",
            "Total number of requeues, by reason",
        ),
        &["reason"],
    )
    .expect("failed to create trust_bundle_requeues_total metric")
});

static TARGETS_SYNCED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trust_bundle_targets_synced_total",
            "Total number of target objects created or updated, by kind",
        ),
        &["kind"],
    )
    .expect("failed to create trust_bundle_targets_synced_total metric")
});

static TARGETS_DELETED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trust_bundle_targets_deleted_total",
            "Total number of target objects removed, by kind",
        ),
        &["kind"],
    )
    .expect("failed to create trust_bundle_targets_deleted_total metric")
});

pub(crate) fn register_bundle_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TARGETS_SYNCED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TARGETS_DELETED_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(seconds: f64) {
    RECONCILIATION_DURATION.observe(seconds);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_targets_synced(kind: &str) {
    TARGETS_SYNCED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_targets_deleted(kind: &str) {
    TARGETS_DELETED_TOTAL.with_label_values(&[kind]).inc();
}
