//! # Watch Loop
//!
//! Wires the bundle/target/namespace/source watches into a single
//! `kube_runtime::Controller` and drives it to completion.
//!
//! Target `ConfigMap`/`Secret` events are handled by `.owns()`, which
//! inherently restricts itself to objects whose controller owner reference
//! names a bundle. Namespace and trust-namespace source events go through
//! `.watches()` with the synchronous mappers in `controller::watches`,
//! backed by the in-memory bundle `Store` kube_runtime already maintains for
//! the primary watch — no extra listing call is needed per event.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::watches;
use crate::crd::Bundle;
use crate::observability::server::ServerState;
use crate::runtime::error_policy::handle_reconciliation_error;
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::api::Api;
use kube_runtime::controller::{Controller, Error as ControllerError};
use kube_runtime::watcher;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Build and run the controller until the process receives a shutdown
/// signal, or a fatal (non-reconciliation) watch error occurs — a listing
/// error during fan-in is worse to paper over than to restart the process
/// from.
pub async fn run_watch_loop(bundles: Api<Bundle>, reconciler: Arc<Reconciler>, server_state: Arc<ServerState>) -> Result<()> {
    let client = reconciler.client.clone();
    let trust_namespace = reconciler.config.trust_namespace.clone();

    let owned_configmaps: Api<ConfigMap> = Api::all(client.clone());
    let owned_secrets: Api<Secret> = Api::all(client.clone());
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let source_configmaps: Api<ConfigMap> = Api::namespaced(client.clone(), &trust_namespace);
    let source_secrets: Api<Secret> = Api::namespaced(client.clone(), &trust_namespace);

    let controller = Controller::new(bundles, watcher::Config::default())
        .owns(owned_configmaps, watcher::Config::default())
        .owns(owned_secrets, watcher::Config::default());

    let store = controller.store();
    let store_for_namespaces = store.clone();
    let store_for_source_configmaps = store.clone();
    let store_for_source_secrets = store.clone();

    let controller = controller
        .watches(namespaces, watcher::Config::default(), move |ns| {
            watches::map_namespace_event(&store_for_namespaces, &ns).into_iter()
        })
        .watches(source_configmaps, watcher::Config::default(), move |cm| {
            watches::map_source_configmap_event(&store_for_source_configmaps, &cm).into_iter()
        })
        .watches(source_secrets, watcher::Config::default(), move |secret| {
            watches::map_source_secret_event(&store_for_source_secrets, &secret).into_iter()
        })
        .shutdown_on_signal();

    server_state.is_ready.store(true, Ordering::Relaxed);
    info!("controller started, watching bundles across all namespaces");

    controller
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object_ref, action)) => {
                    tracing::debug!(bundle = %object_ref.name, ?action, "reconciled");
                }
                Err(ControllerError::ReconcilerFailed(_, object_ref)) => {
                    // Expected: error_policy already scheduled the backoff requeue.
                    warn!(bundle = %object_ref.name, "reconciliation failed, retry scheduled");
                }
                Err(e) => {
                    error!(error = %e, "fatal error during watch fan-in, exiting process");
                    std::process::exit(1);
                }
            }
        })
        .await;

    Ok(())
}
