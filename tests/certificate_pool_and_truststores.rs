//! Two overlapping sources fold into one sorted, deduplicated pool
//! regardless of which source saw which certificate first, and the
//! JKS/PKCS#12 encoders built on top stay byte-identical.

use trust_bundle_controller::certpool::CertPool;
use trust_bundle_controller::truststore::{jks, pkcs12};

const CERT_A: &str = include_str!("fixtures/cert_a.pem");
const CERT_B: &str = include_str!("fixtures/cert_b.pem");
const CERT_C: &str = include_str!("fixtures/cert_c.pem");

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(1_800_000_000, 0).unwrap()
}

#[test]
fn overlapping_sources_fold_into_one_deterministic_pool() {
    // Source 1: A, B. Source 2: B, C. Union is {A, B, C}; B appears twice.
    let mut source_one = CertPool::new(false, now());
    source_one.add(CERT_A.as_bytes()).unwrap();
    source_one.add(CERT_B.as_bytes()).unwrap();

    let mut source_two = CertPool::new(false, now());
    source_two.add(CERT_B.as_bytes()).unwrap();
    source_two.add(CERT_C.as_bytes()).unwrap();

    let mut combined_forward = CertPool::new(false, now());
    combined_forward.add(CERT_A.as_bytes()).unwrap();
    combined_forward.add(CERT_B.as_bytes()).unwrap();
    combined_forward.add(CERT_B.as_bytes()).unwrap();
    combined_forward.add(CERT_C.as_bytes()).unwrap();

    let mut combined_backward = CertPool::new(false, now());
    combined_backward.add(CERT_C.as_bytes()).unwrap();
    combined_backward.add(CERT_B.as_bytes()).unwrap();
    combined_backward.add(CERT_A.as_bytes()).unwrap();

    assert_eq!(combined_forward.size(), 3);
    assert_eq!(combined_forward.pem(), combined_backward.pem());
    assert!(combined_forward.pem().ends_with('\n'));
    assert!(!combined_forward.pem().ends_with("\n\n"));
}

#[test]
fn trust_store_encoders_are_deterministic_over_the_merged_pool() {
    let mut pool = CertPool::new(false, now());
    pool.add(CERT_A.as_bytes()).unwrap();
    pool.add(CERT_B.as_bytes()).unwrap();
    pool.add(CERT_C.as_bytes()).unwrap();

    let jks_first = jks::encode(&pool, "changeit").unwrap();
    let jks_second = jks::encode(&pool, "changeit").unwrap();
    assert_eq!(jks_first, jks_second);

    let pkcs12_first = pkcs12::encode(&pool, "").unwrap();
    let pkcs12_second = pkcs12::encode(&pool, "").unwrap();
    assert_eq!(pkcs12_first, pkcs12_second);
}

#[test]
fn expired_certificate_is_dropped_when_filtering_is_enabled() {
    let expired = include_str!("fixtures/cert_expired.pem");
    let mut filtering = CertPool::new(true, now());
    filtering.add(expired.as_bytes()).unwrap();
    assert!(filtering.is_empty());

    let mut unfiltered = CertPool::new(false, now());
    unfiltered.add(expired.as_bytes()).unwrap();
    assert_eq!(unfiltered.size(), 1);
}
