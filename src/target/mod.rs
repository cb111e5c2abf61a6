//! # Target Reconciler
//!
//! Declarative apply/delete of a single per-namespace `ConfigMap` or
//! `Secret` target: equivalence checking, server-side-apply patching with a
//! stable field manager, and CSA→SSA migration.

pub mod fieldmanager;
pub mod migration;

use crate::constants;
use crate::crd::Bundle;
use crate::error::TrustBundleError;
use crate::observability::metrics;
use crate::source::ResolvedBundle;
use base64::Engine;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::{Resource, ResourceExt};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// The two kinds of objects this controller ever writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetKind {
    ConfigMap,
    Secret,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
        }
    }
}

/// Identifies one target object. `name` is always the bundle's name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub namespace: String,
    pub name: String,
}

/// Which `data`/`binaryData` keys the bundle asks this target to carry.
#[derive(Debug, Clone)]
pub struct TargetKeys {
    pub pem_key: String,
    pub jks_key: Option<String>,
    pub pkcs12_key: Option<String>,
}

impl TargetKeys {
    pub fn expected(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        set.insert(self.pem_key.clone());
        if let Some(k) = &self.jks_key {
            set.insert(k.clone());
        }
        if let Some(k) = &self.pkcs12_key {
            set.insert(k.clone());
        }
        set
    }
}

/// Outcome of a single target sync, for status aggregation and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    Changed,
    Deleted,
}

pub fn pem_hash_hex(pem: &str) -> String {
    let digest = Sha256::digest(pem.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn owner_reference_json(bundle: &Bundle) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": Bundle::api_version(&()),
        "kind": Bundle::kind(&()),
        "name": bundle.name_any(),
        "uid": bundle.uid().unwrap_or_default(),
        "controller": true,
        "blockOwnerDeletion": true,
    })
}

/// Apply/update/delete a single target. `should_exist = false`
/// runs the delete path: apply an empty-data skeleton, then drop the
/// object entirely once it has no data left.
pub async fn sync(
    client: &kube::Client,
    target: &TargetRef,
    bundle: &Bundle,
    resolved: &ResolvedBundle,
    keys: &TargetKeys,
    should_exist: bool,
) -> Result<SyncOutcome, TrustBundleError> {
    match target.kind {
        TargetKind::ConfigMap => sync_configmap(client, target, bundle, resolved, keys, should_exist).await,
        TargetKind::Secret => sync_secret(client, target, bundle, resolved, keys, should_exist).await,
    }
}

pub fn is_controlled_by(owner_references: Option<&Vec<k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference>>, bundle: &Bundle) -> bool {
    owner_references
        .into_iter()
        .flatten()
        .any(|owner| owner.controller == Some(true) && owner.uid == bundle.uid().unwrap_or_default())
}

async fn sync_configmap(
    client: &kube::Client,
    target: &TargetRef,
    bundle: &Bundle,
    resolved: &ResolvedBundle,
    keys: &TargetKeys,
    should_exist: bool,
) -> Result<SyncOutcome, TrustBundleError> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), &target.namespace);
    let existing = api.get_opt(&target.name).await.map_err(TrustBundleError::APIError)?;

    if let Some(mut cm) = existing.clone() {
        if migration::migrate_if_needed(&api, &mut cm, &keys.pem_key).await? {
            return Ok(SyncOutcome::Changed);
        }
    }

    let hash = pem_hash_hex(&resolved.pem);
    let expected = keys.expected();

    if let Some(cm) = &existing {
        let labels_ok = cm
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(constants::LABEL_BUNDLE_NAME))
            == Some(&bundle.name_any());
        let hash_ok = cm
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(constants::ANNOTATION_BUNDLE_HASH))
            == Some(&hash);
        let owner_ok = is_controlled_by(cm.metadata.owner_references.as_ref(), bundle);
        let managed = cm.metadata.managed_fields.clone().unwrap_or_default();
        let mut claimed = fieldmanager::claimed_keys(&managed, constants::FIELD_MANAGER, "data");
        claimed.extend(fieldmanager::claimed_keys(&managed, constants::FIELD_MANAGER, "binaryData"));
        let keys_ok = if should_exist { claimed == expected } else { claimed.is_empty() };

        if should_exist && owner_ok && labels_ok && hash_ok && keys_ok {
            return Ok(SyncOutcome::Unchanged);
        }
    } else if !should_exist {
        return Ok(SyncOutcome::Unchanged);
    }

    let mut data = serde_json::Map::new();
    let mut binary_data = serde_json::Map::new();
    if should_exist {
        data.insert(keys.pem_key.clone(), serde_json::Value::String(resolved.pem.clone()));
        for key in [&keys.jks_key, &keys.pkcs12_key].into_iter().flatten() {
            if let Some(bytes) = resolved.binary.get(key) {
                binary_data.insert(key.clone(), serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes)));
            }
        }
    }

    let mut body = serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": target.name,
            "namespace": target.namespace,
            "labels": { constants::LABEL_BUNDLE_NAME: bundle.name_any() },
            "annotations": { constants::ANNOTATION_BUNDLE_HASH: hash },
            "ownerReferences": [owner_reference_json(bundle)],
        },
        "data": data,
    });
    if !binary_data.is_empty() {
        body["binaryData"] = serde_json::Value::Object(binary_data);
    }

    let params = PatchParams::apply(constants::FIELD_MANAGER).force();
    let applied = api
        .patch(&target.name, &params, &Patch::Apply(&body))
        .await
        .map_err(TrustBundleError::APIError)?;

    if should_exist {
        metrics::increment_targets_synced(TargetKind::ConfigMap.as_str());
        Ok(SyncOutcome::Changed)
    } else {
        let has_data = applied.data.as_ref().is_some_and(|d| !d.is_empty())
            || applied.binary_data.as_ref().is_some_and(|d| !d.is_empty());
        if has_data {
            Ok(SyncOutcome::Changed)
        } else {
            api.delete(&target.name, &DeleteParams::default())
                .await
                .map_err(TrustBundleError::APIError)?;
            metrics::increment_targets_deleted(TargetKind::ConfigMap.as_str());
            Ok(SyncOutcome::Deleted)
        }
    }
}

async fn sync_secret(
    client: &kube::Client,
    target: &TargetRef,
    bundle: &Bundle,
    resolved: &ResolvedBundle,
    keys: &TargetKeys,
    should_exist: bool,
) -> Result<SyncOutcome, TrustBundleError> {
    let api: Api<Secret> = Api::namespaced(client.clone(), &target.namespace);
    let existing = api.get_opt(&target.name).await.map_err(TrustBundleError::APIError)?;

    let hash = pem_hash_hex(&resolved.pem);
    let expected = keys.expected();

    if let Some(secret) = &existing {
        let labels_ok = secret
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(constants::LABEL_BUNDLE_NAME))
            == Some(&bundle.name_any());
        let hash_ok = secret
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(constants::ANNOTATION_BUNDLE_HASH))
            == Some(&hash);
        let owner_ok = is_controlled_by(secret.metadata.owner_references.as_ref(), bundle);
        let managed = secret.metadata.managed_fields.clone().unwrap_or_default();
        let claimed = fieldmanager::claimed_keys(&managed, constants::FIELD_MANAGER, "data");
        let keys_ok = if should_exist { claimed == expected } else { claimed.is_empty() };

        if should_exist && owner_ok && labels_ok && hash_ok && keys_ok {
            return Ok(SyncOutcome::Unchanged);
        }
    } else if !should_exist {
        return Ok(SyncOutcome::Unchanged);
    }

    let mut data = serde_json::Map::new();
    if should_exist {
        data.insert(
            keys.pem_key.clone(),
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(resolved.pem.as_bytes())),
        );
        for key in [&keys.jks_key, &keys.pkcs12_key].into_iter().flatten() {
            if let Some(bytes) = resolved.binary.get(key) {
                data.insert(key.clone(), serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes)));
            }
        }
    }

    let body = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": target.name,
            "namespace": target.namespace,
            "labels": { constants::LABEL_BUNDLE_NAME: bundle.name_any() },
            "annotations": { constants::ANNOTATION_BUNDLE_HASH: hash },
            "ownerReferences": [owner_reference_json(bundle)],
        },
        "data": data,
    });

    let params = PatchParams::apply(constants::FIELD_MANAGER).force();
    let applied = api
        .patch(&target.name, &params, &Patch::Apply(&body))
        .await
        .map_err(TrustBundleError::APIError)?;

    if should_exist {
        metrics::increment_targets_synced(TargetKind::Secret.as_str());
        Ok(SyncOutcome::Changed)
    } else {
        let has_data = applied.data.as_ref().is_some_and(|d| !d.is_empty());
        if has_data {
            Ok(SyncOutcome::Changed)
        } else {
            api.delete(&target.name, &DeleteParams::default())
                .await
                .map_err(TrustBundleError::APIError)?;
            metrics::increment_targets_deleted(TargetKind::Secret.as_str());
            Ok(SyncOutcome::Deleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pem_hash_hex_is_stable_hex_sha256() {
        let hash = pem_hash_hex("hello");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, pem_hash_hex("hello"));
    }

    #[test]
    fn target_keys_expected_includes_only_configured_formats() {
        let keys = TargetKeys {
            pem_key: "ca.pem".to_string(),
            jks_key: Some("ca.jks".to_string()),
            pkcs12_key: None,
        };
        let expected = keys.expected();
        assert!(expected.contains("ca.pem"));
        assert!(expected.contains("ca.jks"));
        assert_eq!(expected.len(), 2);
    }
}
