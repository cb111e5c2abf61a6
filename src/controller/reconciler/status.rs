//! # Bundle Status Patching
//!
//! Wraps the pure [`crate::crd::status`] helpers with the actual API calls:
//! a one-shot migration of the bundle's own status field ownership, and the
//! server-side-apply status patch.

use crate::constants;
use crate::crd::status::{with_synced_condition, BundleStatus};
use crate::crd::Bundle;
use crate::error::TrustBundleError;
use crate::target::fieldmanager;
use kube::api::{Api, Patch, PatchParams, PostParams};

/// If `bundle`'s `status` subresource carries a legacy client-side-apply
/// managed-fields entry, rewrite it to `Apply`/canonical-manager and push a
/// resource-level replace. Mutates `bundle` in place so the caller's
/// in-memory copy reflects the migration without a second fetch.
pub async fn migrate_status_ownership(
    api: &Api<Bundle>,
    bundle: &mut Bundle,
) -> Result<bool, TrustBundleError> {
    let entries = bundle.metadata.managed_fields.clone().unwrap_or_default();
    let legacy_managers = constants::LEGACY_FIELD_MANAGERS;
    let has_legacy = entries.iter().any(|entry| {
        entry.manager.as_deref().is_some_and(|m| legacy_managers.contains(&m))
            && entry.operation.as_deref() == Some("Update")
            && entry
                .fields_v1
                .as_ref()
                .is_some_and(|fields| !fieldmanager::keys_under_root(&fields.0, "status").is_empty())
    });
    if !has_legacy {
        return Ok(false);
    }

    let rewritten: Vec<_> = entries
        .into_iter()
        .map(|mut entry| {
            if entry.operation.as_deref() == Some("Update")
                && entry.manager.as_deref().is_some_and(|m| legacy_managers.contains(&m))
            {
                entry.manager = Some(constants::FIELD_MANAGER.to_string());
                entry.operation = Some("Apply".to_string());
            }
            entry
        })
        .collect();
    bundle.metadata.managed_fields = Some(rewritten);

    let name = bundle.metadata.name.clone().unwrap_or_default();
    api.replace(&name, &PostParams::default(), bundle)
        .await
        .map_err(TrustBundleError::APIError)?;
    tracing::info!(bundle = name, "migrated legacy status managed fields to server-side apply");
    Ok(true)
}

/// Build the next `Synced` condition without talking to the API; the
/// caller decides whether the result actually differs from
/// the bundle's current status before issuing the patch.
pub fn next_status(
    bundle: &Bundle,
    status: &str,
    reason: &str,
    message: String,
    default_ca_package_version: Option<String>,
) -> BundleStatus {
    let current = bundle.status.clone().unwrap_or_default();
    let generation = bundle.metadata.generation.unwrap_or(0);
    let conditions = with_synced_condition(
        &current.conditions,
        status,
        reason,
        message,
        generation,
        chrono::Utc::now(),
    );
    BundleStatus {
        conditions,
        default_ca_package_version: default_ca_package_version.or(current.default_ca_package_version),
    }
}

/// Patch `status` via server-side apply under the canonical field manager.
pub async fn patch_status(
    api: &Api<Bundle>,
    name: &str,
    status: &BundleStatus,
) -> Result<(), TrustBundleError> {
    let body = serde_json::json!({
        "apiVersion": format!("{}/{}", "trust.cert-manager.io", "v1alpha1"),
        "kind": "Bundle",
        "status": status,
    });
    api.patch_status(name, &PatchParams::apply(constants::FIELD_MANAGER).force(), &Patch::Apply(&body))
        .await
        .map_err(TrustBundleError::APIError)?;
    Ok(())
}
