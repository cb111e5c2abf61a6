//! # Managed-Fields Bookkeeping
//!
//! Helpers for reading which `data`/`binaryData` keys a given field manager
//! currently owns on a target object, expressed as a tree-walk over the
//! `FieldsV1` JSON payload Kubernetes attaches to each `managedFields` entry.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ManagedFieldsEntry;
use std::collections::BTreeSet;

/// The set of leaf key names this `manager` currently claims under `root`
/// (`"data"` or `"binaryData"`), across every managed-fields entry.
pub fn claimed_keys(entries: &[ManagedFieldsEntry], manager: &str, root: &str) -> BTreeSet<String> {
    entries
        .iter()
        .filter(|e| e.manager.as_deref() == Some(manager))
        .filter_map(|e| e.fields_v1.as_ref())
        .flat_map(|fields| keys_under_root(&fields.0, root))
        .collect()
}

/// Whether one of `legacy_managers` holds an `Update` (client-side-apply)
/// managed-fields entry covering `key` under `root`. This is the marker the
/// CSA→SSA migration looks for; a third-party manager outside that named
/// list is never treated as legacy, even if it also holds an `Update` entry
/// over the same key.
pub fn has_legacy_update_entry(
    entries: &[ManagedFieldsEntry],
    legacy_managers: &[&str],
    root: &str,
    key: &str,
) -> bool {
    entries.iter().any(|entry| {
        entry.manager.as_deref().is_some_and(|m| legacy_managers.contains(&m))
            && entry.operation.as_deref() == Some("Update")
            && entry
                .fields_v1
                .as_ref()
                .is_some_and(|fields| keys_under_root(&fields.0, root).contains(key))
    })
}

/// Walk a `FieldsV1` JSON tree and collect the leaf key names directly
/// under `f:<root>`, stripping the `f:` prefix Kubernetes uses for map
/// keys.
pub fn keys_under_root(fields: &serde_json::Value, root: &str) -> BTreeSet<String> {
    let root_key = format!("f:{root}");
    fields
        .get(&root_key)
        .and_then(serde_json::Value::as_object)
        .map(|obj| {
            obj.keys()
                .filter_map(|k| k.strip_prefix("f:"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::FieldsV1;
    use serde_json::json;

    fn entry(manager: &str, operation: &str, fields: serde_json::Value) -> ManagedFieldsEntry {
        ManagedFieldsEntry {
            manager: Some(manager.to_string()),
            operation: Some(operation.to_string()),
            fields_v1: Some(FieldsV1(fields)),
            ..Default::default()
        }
    }

    #[test]
    fn claimed_keys_reads_only_named_manager() {
        let entries = vec![
            entry(
                "trust-manager",
                "Apply",
                json!({"f:data": {"f:bundle.pem": {}, "f:truststore.jks": {}}}),
            ),
            entry("kubectl-client-side-apply", "Update", json!({"f:data": {"f:other": {}}})),
        ];
        let claimed = claimed_keys(&entries, "trust-manager", "data");
        assert_eq!(
            claimed,
            BTreeSet::from(["bundle.pem".to_string(), "truststore.jks".to_string()])
        );
    }

    #[test]
    fn legacy_update_entry_detected_for_named_legacy_manager() {
        let entries = vec![entry(
            "Go-http-client",
            "Update",
            json!({"f:data": {"f:bundle.pem": {}}}),
        )];
        let legacy = crate::constants::LEGACY_FIELD_MANAGERS;
        assert!(has_legacy_update_entry(&entries, legacy, "data", "bundle.pem"));
        assert!(!has_legacy_update_entry(&entries, legacy, "data", "other.pem"));
    }

    #[test]
    fn canonical_manager_is_never_legacy() {
        let entries = vec![entry(
            "trust-manager",
            "Update",
            json!({"f:data": {"f:bundle.pem": {}}}),
        )];
        let legacy = crate::constants::LEGACY_FIELD_MANAGERS;
        assert!(!has_legacy_update_entry(&entries, legacy, "data", "bundle.pem"));
    }

    #[test]
    fn third_party_manager_outside_the_legacy_list_is_never_reclaimed() {
        let entries = vec![entry(
            "some-other-operator",
            "Update",
            json!({"f:data": {"f:bundle.pem": {}}}),
        )];
        let legacy = crate::constants::LEGACY_FIELD_MANAGERS;
        assert!(!has_legacy_update_entry(&entries, legacy, "data", "bundle.pem"));
    }
}
