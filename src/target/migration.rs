//! # CSA → SSA Field-Ownership Migration
//!
//! Earlier controller versions (and a buggy client-library release) wrote
//! the PEM key via plain client-side-apply `Update` operations under one of
//! [`crate::constants::LEGACY_FIELD_MANAGERS`]. When that marker is found on
//! a `ConfigMap`, rewrite the offending managed-fields entries in place to
//! `Apply` operations under the canonical field manager and push the change
//! as a resource-level replace — never as an apply, which would only add a
//! new entry rather than correct the old one. Any other manager's `Update`
//! entry over the same key is left untouched.

use super::fieldmanager;
use crate::error::TrustBundleError;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, PostParams};

/// If `cm` carries a legacy `Update` managed-fields entry covering
/// `pem_key`, rewrite it to `Apply`/`trust-manager` and push the change.
/// Returns whether a migration was performed (callers should requeue after
/// a `true` result so the subsequent reconciliation observes the rewritten
/// object).
pub async fn migrate_if_needed(
    api: &Api<ConfigMap>,
    cm: &mut ConfigMap,
    pem_key: &str,
) -> Result<bool, TrustBundleError> {
    let entries = cm.metadata.managed_fields.clone().unwrap_or_default();
    let legacy_managers = crate::constants::LEGACY_FIELD_MANAGERS;
    if !fieldmanager::has_legacy_update_entry(&entries, legacy_managers, "data", pem_key) {
        return Ok(false);
    }

    let rewritten: Vec<_> = entries
        .into_iter()
        .map(|mut entry| {
            let covers_pem_key = entry
                .fields_v1
                .as_ref()
                .is_some_and(|fields| fieldmanager::keys_under_root(&fields.0, "data").contains(pem_key));
            if entry.operation.as_deref() == Some("Update")
                && entry.manager.as_deref().is_some_and(|m| legacy_managers.contains(&m))
                && covers_pem_key
            {
                entry.manager = Some(crate::constants::FIELD_MANAGER.to_string());
                entry.operation = Some("Apply".to_string());
            }
            entry
        })
        .collect();

    cm.metadata.managed_fields = Some(rewritten);

    let name = cm.metadata.name.clone().unwrap_or_default();
    api.replace(&name, &PostParams::default(), cm)
        .await
        .map_err(TrustBundleError::APIError)?;

    tracing::info!(target = name, "migrated legacy client-side-apply managed fields to server-side apply");
    Ok(true)
}
