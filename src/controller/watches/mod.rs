//! # Watch Fan-In
//!
//! Maps `Namespace` and trust-namespace `ConfigMap`/`Secret` events to the
//! set of bundles that need to be re-reconciled. Target `ConfigMap`/`Secret`
//! events are handled separately, by `kube_runtime::Controller::owns`, which
//! already restricts itself to objects whose controller owner reference
//! points at a bundle, so no hand-written mapper is needed for that source.
//!
//! Bundle events need no mapper either: `Controller::new` watches `Bundle`
//! directly.

use crate::crd::{Bundle, ObjectSelector, SourceVariant};
use crate::selector;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;

/// Every bundle whose `namespaceSelector` matches `namespace`'s labels.
pub fn map_namespace_event(store: &Store<Bundle>, namespace: &Namespace) -> Vec<ObjectRef<Bundle>> {
    let labels = namespace.metadata.labels.clone().unwrap_or_default().into_iter().collect();
    store
        .state()
        .into_iter()
        .filter(|bundle| selector::matches(bundle.spec.target.namespace_selector.as_ref(), &labels))
        .map(|bundle| ObjectRef::from_obj(bundle.as_ref()))
        .collect()
}

/// Every bundle with a `configMap` source entry whose explicit name equals
/// `cm`'s name, or whose selector matches `cm`'s labels.
pub fn map_source_configmap_event(store: &Store<Bundle>, cm: &ConfigMap) -> Vec<ObjectRef<Bundle>> {
    let name = cm.name_any();
    let labels = cm.metadata.labels.clone().unwrap_or_default().into_iter().collect();
    store
        .state()
        .into_iter()
        .filter(|bundle| {
            bundle.spec.sources.iter().any(|source| {
                matches!(source.variant(), Ok(SourceVariant::ConfigMap(obj)) if source_matches(obj, &name, &labels))
            })
        })
        .map(|bundle| ObjectRef::from_obj(bundle.as_ref()))
        .collect()
}

/// Same as [`map_source_configmap_event`] but for `Secret` sources.
pub fn map_source_secret_event(store: &Store<Bundle>, secret: &Secret) -> Vec<ObjectRef<Bundle>> {
    let name = secret.name_any();
    let labels = secret.metadata.labels.clone().unwrap_or_default().into_iter().collect();
    store
        .state()
        .into_iter()
        .filter(|bundle| {
            bundle.spec.sources.iter().any(|source| {
                matches!(source.variant(), Ok(SourceVariant::Secret(obj)) if source_matches(obj, &name, &labels))
            })
        })
        .map(|bundle| ObjectRef::from_obj(bundle.as_ref()))
        .collect()
}

fn source_matches(obj: &crate::crd::ObjectSourceSpec, name: &str, labels: &std::collections::BTreeMap<String, String>) -> bool {
    match obj.object_selector() {
        Ok(ObjectSelector::Name(source_name)) => source_name == name,
        Ok(ObjectSelector::Selector(label_selector)) => selector::matches(Some(label_selector), labels),
        Err(_) => false,
    }
}
