//! # Error Policy
//!
//! Maps a failed `reconcile` into the next `Action`, applying Fibonacci
//! backoff tracked per bundle so one failing bundle's retry cadence never
//! perturbs another's.

use crate::constants;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::Bundle;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// `kube_runtime::Controller`'s error-policy hook: called whenever
/// `reconcile` returns `Err`, once per failed attempt.
pub fn handle_reconciliation_error(bundle: Arc<Bundle>, error: &ReconcilerError, ctx: Arc<Reconciler>) -> Action {
    let name = bundle.name_any();

    let span = tracing::span!(tracing::Level::ERROR, "controller.reconcile.error", bundle = %name, error = %error);
    let _guard = span.enter();

    error!("reconciliation failed for bundle {name}: {error}");
    metrics::increment_reconciliation_errors();

    let backoff_secs = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(name.clone()).or_insert_with(|| BackoffState {
                backoff: FibonacciBackoff::new(constants::BASE_BACKOFF_SECS, constants::MAX_BACKOFF_SECS),
                error_count: 0,
            });
            state.increment_error();
            state.backoff.next_backoff_seconds()
        }
        Err(e) => {
            warn!("failed to lock backoff_states: {e}, using base backoff");
            constants::BASE_BACKOFF_SECS
        }
    };

    info!("requeuing bundle {name} in {backoff_secs}s after error");
    metrics::increment_requeues_total("error-backoff");
    Action::requeue(std::time::Duration::from_secs(backoff_secs))
}
