//! # Bundle Status
//!
//! Status type for tracking reconciliation state of a `Bundle`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status of the `Bundle` resource.
///
/// Conditions are patched, not read-modify-written: the reconciler builds a
/// partial status document containing only the conditions it touched and
/// lets the server-side-apply merge handle the rest.
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BundleStatus {
    /// Conditions, keyed by `type`. Only `Synced` is populated today.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Opaque identifier of the default CA package bundled at last sync,
    /// if any source in the bundle used `useDefaultCAs: true`.
    #[serde(default)]
    pub default_ca_package_version: Option<String>,
}

/// A condition on the `Bundle` status, shaped like the community
/// "conditions" convention (`type`/`status`/`reason`/`message`/
/// `observedGeneration`/`lastTransitionTime`) but defined locally rather
/// than reusing `k8s-openapi`'s own `Condition` type, which this crate's
/// `k8s-openapi` feature set doesn't derive `JsonSchema` for.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// RFC 3339 timestamp, formatted with [`chrono::DateTime::to_rfc3339`].
    pub last_transition_time: String,
}

/// Reason strings used on the `Synced` condition and mirrored events.
pub mod reasons {
    pub const SYNCED: &str = "Synced";
    pub const SOURCE_NOT_FOUND: &str = "SourceNotFound";
    pub const SECRET_TARGETS_DISABLED: &str = "SecretTargetsDisabled";
    pub const SYNC_CONFIGMAP_TARGET_FAILED: &str = "SyncConfigMapTargetFailed";
    pub const SYNC_SECRET_TARGET_FAILED: &str = "SyncSecretTargetFailed";
    pub const INVALID_SECRET_SOURCE: &str = "InvalidSecretSource";
}

/// `Synced` is the only condition type this controller writes.
pub const CONDITION_TYPE_SYNCED: &str = "Synced";

/// Build (or refresh) the `Synced` condition, returning a new condition list
/// with `lastTransitionTime` advanced only when the status value actually
/// flips. `observedGeneration` never regresses and transition time is not
/// churned on every reconcile.
pub fn with_synced_condition(
    existing: &[Condition],
    status: &str,
    reason: &str,
    message: String,
    observed_generation: i64,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<Condition> {
    let previous = existing.iter().find(|c| c.type_ == CONDITION_TYPE_SYNCED);
    let last_transition_time = match previous {
        Some(prev) if prev.status == status => prev.last_transition_time.clone(),
        _ => now.to_rfc3339(),
    };

    vec![Condition {
        type_: CONDITION_TYPE_SYNCED.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message,
        observed_generation: Some(observed_generation),
        last_transition_time,
    }]
}

/// Whether `conditions` already carries an up-to-date `Synced=True`
/// condition for `observed_generation`, in which case a reconcile that
/// produced no target changes should skip patching status entirely.
pub fn is_already_synced(conditions: &[Condition], observed_generation: i64) -> bool {
    conditions.iter().any(|c| {
        c.type_ == CONDITION_TYPE_SYNCED
            && c.status == "True"
            && c.reason == reasons::SYNCED
            && c.observed_generation == Some(observed_generation)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn transition_time_is_stable_when_status_unchanged() {
        let first = with_synced_condition(&[], "True", reasons::SYNCED, "ok".into(), 1, ts(100));
        let second = with_synced_condition(&first, "True", reasons::SYNCED, "ok".into(), 2, ts(200));
        assert_eq!(
            first[0].last_transition_time,
            second[0].last_transition_time
        );
        assert_eq!(second[0].observed_generation, Some(2));
    }

    #[test]
    fn transition_time_advances_on_flip() {
        let first = with_synced_condition(&[], "True", reasons::SYNCED, "ok".into(), 1, ts(100));
        let second = with_synced_condition(
            &first,
            "False",
            reasons::SOURCE_NOT_FOUND,
            "missing".into(),
            2,
            ts(200),
        );
        assert_ne!(
            first[0].last_transition_time,
            second[0].last_transition_time
        );
    }

    #[test]
    fn already_synced_requires_matching_generation() {
        let conds = with_synced_condition(&[], "True", reasons::SYNCED, "ok".into(), 5, ts(1));
        assert!(is_already_synced(&conds, 5));
        assert!(!is_already_synced(&conds, 6));
    }
}
