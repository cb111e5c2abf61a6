//! A bundle that reconciles cleanly twice in a row must not churn
//! `lastTransitionTime` or regress `observedGeneration`, and a bundle whose
//! source goes missing then comes back must still reach `Synced=True`
//! without leaving stale reasons behind.

use trust_bundle_controller::crd::status::{is_already_synced, reasons, with_synced_condition};

fn ts(secs: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(secs, 0).unwrap()
}

#[test]
fn repeated_clean_reconciles_at_the_same_generation_are_idempotent() {
    let after_first = with_synced_condition(&[], "True", reasons::SYNCED, "synced 2 certificates".into(), 1, ts(100));
    assert!(!is_already_synced(&[], 1));
    assert!(is_already_synced(&after_first, 1));

    // A second reconcile at the same generation that produced no target
    // changes should be skippable — simulate the reconciler deciding not to
    // call with_synced_condition at all, and confirm the existing condition
    // still reads as synced.
    assert!(is_already_synced(&after_first, 1));

    // Generation bumps but the reconcile is still clean: the condition
    // value doesn't flip, so lastTransitionTime must hold.
    let after_second = with_synced_condition(&after_first, "True", reasons::SYNCED, "synced 2 certificates".into(), 2, ts(500));
    assert_eq!(after_first[0].last_transition_time, after_second[0].last_transition_time);
    assert_eq!(after_second[0].observed_generation, Some(2));
    assert!(!is_already_synced(&after_first, 2));
    assert!(is_already_synced(&after_second, 2));
}

#[test]
fn source_goes_missing_then_recovers_without_stale_reason() {
    let synced = with_synced_condition(&[], "True", reasons::SYNCED, "synced 1 certificate".into(), 1, ts(0));

    let broken = with_synced_condition(
        &synced,
        "False",
        reasons::SOURCE_NOT_FOUND,
        "configmap \"root-cas\" not found in namespace \"trust\"".into(),
        2,
        ts(60),
    );
    assert_eq!(broken[0].reason, reasons::SOURCE_NOT_FOUND);
    assert_ne!(synced[0].last_transition_time, broken[0].last_transition_time);
    assert!(!is_already_synced(&broken, 2));

    let recovered = with_synced_condition(&broken, "True", reasons::SYNCED, "synced 1 certificate".into(), 3, ts(120));
    assert_eq!(recovered[0].reason, reasons::SYNCED);
    assert_eq!(recovered[0].status, "True");
    assert_ne!(broken[0].last_transition_time, recovered[0].last_transition_time);
    assert!(is_already_synced(&recovered, 3));

    // Only one condition is ever tracked; no accumulation of stale entries.
    assert_eq!(recovered.len(), 1);
}

#[test]
fn observed_generation_never_silently_regresses_across_a_sync_sequence() {
    let mut conditions = Vec::new();
    let mut last_generation = 0i64;
    for (generation, status, reason) in [
        (1i64, "True", reasons::SYNCED),
        (2, "False", reasons::SECRET_TARGETS_DISABLED),
        (3, "True", reasons::SYNCED),
    ] {
        conditions = with_synced_condition(&conditions, status, reason, "message".into(), generation, ts(generation * 10));
        let observed = conditions[0].observed_generation.expect("observedGeneration always set");
        assert!(observed > last_generation, "observedGeneration must advance, got {observed} after {last_generation}");
        last_generation = observed;
    }
    assert_eq!(last_generation, 3);
}
