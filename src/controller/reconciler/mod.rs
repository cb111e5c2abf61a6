//! # Bundle Reconciler
//!
//! The top-level loop: resolves sources, fans a bundle out to per-namespace
//! targets, garbage-collects targets that no longer match, and maintains the
//! `Synced` status condition.

pub mod status;

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::status::reasons;
use crate::crd::Bundle;
use crate::defaultca::DefaultCaPackage;
use crate::error::TrustBundleError;
use crate::observability::metrics;
use crate::selector;
use crate::source;
use crate::target::{self, TargetKeys, TargetKind, TargetRef, SyncOutcome};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::api::{Api, ListParams};
use kube::runtime::controller::Action;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Resource, ResourceExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

/// Kept as a type alias so `error_policy` and `reconciler` agree on a name
/// even though this controller only has one error type.
pub type ReconcilerError = TrustBundleError;

/// Per-bundle Fibonacci backoff state, tracked independently so one
/// misbehaving bundle cannot perturb another's retry cadence.
#[derive(Debug)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

/// Shared reconciler context, handed to every `reconcile` call as
/// `Arc<Reconciler>` by `kube_runtime::Controller`.
#[derive(Debug)]
pub struct Reconciler {
    pub client: kube::Client,
    pub config: ControllerConfig,
    pub default_ca: Option<DefaultCaPackage>,
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl Reconciler {
    pub fn new(client: kube::Client, config: ControllerConfig, default_ca: Option<DefaultCaPackage>) -> Self {
        Self {
            client,
            config,
            default_ca,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    fn reporter(&self) -> Reporter {
        Reporter::from(crate::constants::FIELD_MANAGER.to_owned())
    }
}

async fn emit_event(
    client: &kube::Client,
    reporter: Reporter,
    bundle: &Bundle,
    type_: EventType,
    reason: &str,
    note: String,
) {
    let recorder = Recorder::new(client.clone(), reporter);
    let event = Event {
        type_,
        reason: reason.to_string(),
        note: Some(note),
        action: "Reconcile".to_string(),
        secondary: None,
    };
    if let Err(e) = recorder.publish(&event, &bundle.object_ref(&())).await {
        tracing::warn!(error = %e, "failed to publish bundle event");
    }
}

/// One full reconciliation pass for a single bundle. Fetching
/// the bundle itself is handled by `kube_runtime`'s reflector: by the time
/// this is called the object already exists, and its deletion is handled
/// entirely by Kubernetes garbage collection via the owner references every
/// target carries — no explicit cascade-delete step is needed here.
pub async fn reconcile(bundle: std::sync::Arc<Bundle>, ctx: std::sync::Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let start = std::time::Instant::now();
    metrics::increment_reconciliations();

    let name = bundle.name_any();
    let span = tracing::span!(tracing::Level::INFO, "controller.reconcile", bundle = %name);
    let _guard = span.enter();

    let result = reconcile_inner(&bundle, &ctx).await;
    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    if result.is_ok() {
        if let Ok(mut states) = ctx.backoff_states.lock() {
            if let Some(state) = states.get_mut(&name) {
                state.backoff.reset();
                state.error_count = 0;
            }
        }
    }

    result
}

async fn reconcile_inner(bundle: &Bundle, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let bundles: Api<Bundle> = Api::all(ctx.client.clone());
    let name = bundle.name_any();
    let generation = bundle.metadata.generation.unwrap_or(0);
    let reporter = ctx.reporter();

    // Step 2: one-shot status field-ownership migration.
    let mut bundle = bundle.clone();
    if status::migrate_status_ownership(&bundles, &mut bundle).await? {
        return Ok(Action::requeue(Duration::from_secs(0)));
    }

    // Step 3: resolve sources into a canonical bundle.
    let resolved = match source::build(
        &ctx.client,
        &ctx.config.trust_namespace,
        &bundle.spec.sources,
        bundle.spec.target.additional_formats.as_ref(),
        ctx.default_ca.as_ref(),
        ctx.config.filter_expired_certs,
        chrono::Utc::now(),
    )
    .await
    {
        Ok(resolved) => resolved,
        Err(e @ (TrustBundleError::NotFound(_) | TrustBundleError::InvalidSecretSource(_))) => {
            let reason = e.condition_reason().unwrap_or(reasons::SOURCE_NOT_FOUND);
            let next = status::next_status(&bundle, "False", reason, e.to_string(), None);
            status::patch_status(&bundles, &name, &next).await?;
            emit_event(&ctx.client, reporter, &bundle, EventType::Warning, reason, e.to_string()).await;
            return Ok(Action::await_change());
        }
        Err(e) => {
            metrics::increment_reconciliation_errors();
            emit_event(&ctx.client, reporter, &bundle, EventType::Warning, "SourceResolutionFailed", e.to_string()).await;
            return Err(e);
        }
    };

    // Step 4: secret targets disabled check.
    if bundle.spec.target.secret.is_some() && !ctx.config.secret_targets_enabled {
        let next = status::next_status(
            &bundle,
            "False",
            reasons::SECRET_TARGETS_DISABLED,
            "secret-targets-enabled is false; Secret target is ignored".to_string(),
            resolved.default_ca_id.clone(),
        );
        status::patch_status(&bundles, &name, &next).await?;
        emit_event(
            &ctx.client,
            ctx.reporter(),
            &bundle,
            EventType::Warning,
            reasons::SECRET_TARGETS_DISABLED,
            "bundle requests a Secret target but secret-targets-enabled is false".to_string(),
        )
        .await;
        return Ok(Action::await_change());
    }

    // Step 5: evaluate the namespace selector, compute the desired target set.
    let namespaces: Api<Namespace> = Api::all(ctx.client.clone());
    let live_namespaces: Vec<String> = namespaces
        .list(&ListParams::default())
        .await
        .map_err(TrustBundleError::APIError)?
        .items
        .into_iter()
        .filter(|ns| {
            let labels = ns.metadata.labels.clone().unwrap_or_default().into_iter().collect();
            let terminating = ns.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Terminating");
            !terminating && selector::matches(bundle.spec.target.namespace_selector.as_ref(), &labels)
        })
        .filter_map(|ns| ns.metadata.name)
        .collect();

    let mut desired: Vec<(TargetRef, TargetKeys)> = Vec::new();
    if let Some(cm_spec) = &bundle.spec.target.config_map {
        let keys = target_keys(&bundle, &cm_spec.key);
        for ns in &live_namespaces {
            desired.push((
                TargetRef { kind: TargetKind::ConfigMap, namespace: ns.clone(), name: name.clone() },
                keys.clone(),
            ));
        }
    }
    if let Some(secret_spec) = &bundle.spec.target.secret {
        let keys = target_keys(&bundle, &secret_spec.key);
        for ns in &live_namespaces {
            desired.push((
                TargetRef { kind: TargetKind::Secret, namespace: ns.clone(), name: name.clone() },
                keys.clone(),
            ));
        }
    }

    let desired_refs: BTreeSet<TargetRef> = desired.iter().map(|(t, _)| t.clone()).collect();

    // Step 6: garbage-collect controlled targets no longer in the desired set.
    let label_selector = format!("{}={}", crate::constants::LABEL_BUNDLE_NAME, name);
    let list_params = ListParams::default().labels(&label_selector);

    let configmaps: Api<ConfigMap> = Api::all(ctx.client.clone());
    let secrets: Api<Secret> = Api::all(ctx.client.clone());

    let mut to_delete: Vec<(TargetRef, TargetKeys)> = Vec::new();
    for cm in configmaps.list(&list_params).await.map_err(TrustBundleError::APIError)?.items {
        if cm.metadata.deletion_timestamp.is_some() || !target::is_controlled_by(cm.metadata.owner_references.as_ref(), &bundle) {
            continue;
        }
        let target_ref = TargetRef {
            kind: TargetKind::ConfigMap,
            namespace: cm.metadata.namespace.clone().unwrap_or_default(),
            name: cm.metadata.name.clone().unwrap_or_default(),
        };
        if !desired_refs.contains(&target_ref) {
            let keys = bundle
                .spec
                .target
                .config_map
                .as_ref()
                .map(|spec| target_keys(&bundle, &spec.key))
                .unwrap_or_else(|| target_keys(&bundle, "ca-bundle.crt"));
            to_delete.push((target_ref, keys));
        }
    }
    for secret in secrets.list(&list_params).await.map_err(TrustBundleError::APIError)?.items {
        if secret.metadata.deletion_timestamp.is_some() || !target::is_controlled_by(secret.metadata.owner_references.as_ref(), &bundle) {
            continue;
        }
        let target_ref = TargetRef {
            kind: TargetKind::Secret,
            namespace: secret.metadata.namespace.clone().unwrap_or_default(),
            name: secret.metadata.name.clone().unwrap_or_default(),
        };
        if !desired_refs.contains(&target_ref) {
            let keys = bundle
                .spec
                .target
                .secret
                .as_ref()
                .map(|spec| target_keys(&bundle, &spec.key))
                .unwrap_or_else(|| target_keys(&bundle, "ca-bundle.crt"));
            to_delete.push((target_ref, keys));
        }
    }

    // Step 7: sync every target in the union.
    let mut any_changed = false;
    let mut failure: Option<(TrustBundleError, TargetKind)> = None;

    for (target_ref, keys) in desired.iter() {
        match target::sync(&ctx.client, target_ref, &bundle, &resolved, keys, true).await {
            Ok(SyncOutcome::Unchanged) => {}
            Ok(_) => any_changed = true,
            Err(e) => {
                failure = Some((e, target_ref.kind));
                break;
            }
        }
    }
    if failure.is_none() {
        for (target_ref, keys) in to_delete.iter() {
            match target::sync(&ctx.client, target_ref, &bundle, &resolved, keys, false).await {
                Ok(SyncOutcome::Unchanged) => {}
                Ok(_) => any_changed = true,
                Err(e) => {
                    failure = Some((e, target_ref.kind));
                    break;
                }
            }
        }
    }

    // Step 7 (cont'd): any target failure transitions status and requests backoff.
    if let Some((e, kind)) = failure {
        let reason = match kind {
            TargetKind::ConfigMap => reasons::SYNC_CONFIGMAP_TARGET_FAILED,
            TargetKind::Secret => reasons::SYNC_SECRET_TARGET_FAILED,
        };
        metrics::increment_reconciliation_errors();
        let next = status::next_status(&bundle, "False", reason, e.to_string(), resolved.default_ca_id.clone());
        status::patch_status(&bundles, &name, &next).await?;
        emit_event(&ctx.client, ctx.reporter(), &bundle, EventType::Warning, reason, e.to_string()).await;
        return Err(e);
    }

    // Step 8 + 9: record default-CA version, patch status only on change.
    let already_synced = bundle
        .status
        .as_ref()
        .is_some_and(|s| crate::crd::status::is_already_synced(&s.conditions, generation));

    if !any_changed && already_synced {
        return Ok(Action::await_change());
    }

    let message = format!(
        "synced {} target(s) across {} namespace(s)",
        desired.len(),
        live_namespaces.len()
    );
    let next = status::next_status(&bundle, "True", reasons::SYNCED, message.clone(), resolved.default_ca_id.clone());
    status::patch_status(&bundles, &name, &next).await?;
    emit_event(&ctx.client, ctx.reporter(), &bundle, EventType::Normal, reasons::SYNCED, message).await;

    Ok(Action::await_change())
}

fn target_keys(bundle: &Bundle, pem_key: &str) -> TargetKeys {
    let formats = bundle.spec.target.additional_formats.as_ref();
    TargetKeys {
        pem_key: pem_key.to_string(),
        jks_key: formats.and_then(|f| f.jks.as_ref()).map(|jks| jks.key.clone()),
        pkcs12_key: formats.and_then(|f| f.pkcs12.as_ref()).map(|p| p.key.clone()),
    }
}
