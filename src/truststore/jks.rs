//! # JKS Encoder
//!
//! Writes a Java KeyStore (JKS) file containing only trusted-certificate
//! entries, following the documented JKS v2 binary layout (magic
//! `0xFEEDFEED`, big-endian integers, "modified UTF-8" strings, and a
//! trailing SHA-1 integrity digest salted with the literal string
//! `"Mighty Aphrodite"`). This is the same layout produced by the JDK's own
//! `JKS` `KeyStore` provider when it contains only `trustedCertEntry`
//! entries, which is all a trust bundle ever needs.
//!
//! Determinism: for a fixed certificate set and password, the output is
//! byte-identical. The `creationTime` field of every entry is set to the
//! certificate's `notBefore`, never wall-clock time, so two runs over the
//! same pool never differ.

use crate::certpool::CertPool;
use crate::error::TrustBundleError;
use sha1::{Digest, Sha1};

const JKS_MAGIC: u32 = 0xFEED_FEED;
const JKS_VERSION: u32 = 2;
const TRUSTED_CERT_ENTRY_TAG: u32 = 2;
const CERT_TYPE: &str = "X.509";
/// Fixed salt string baked into every JKS implementation; not a secret.
const MAC_SALT: &str = "Mighty Aphrodite";

/// Encode `pool` as a JKS trust store protected by `password`.
///
/// Failure is reported as [`TrustBundleError::EncodingError`] and treated
/// by the caller as transient.
pub fn encode(pool: &CertPool, password: &str) -> Result<Vec<u8>, TrustBundleError> {
    let aliases = super::aliases(pool)?;
    let mut body = Vec::new();

    write_u32(&mut body, JKS_MAGIC);
    write_u32(&mut body, JKS_VERSION);
    write_u32(&mut body, pool.size() as u32);

    for (alias, der) in aliases.iter().zip(pool.der_certificates()) {
        let (_, cert) = x509_parser::parse_x509_certificate(der).map_err(|e| {
            TrustBundleError::EncodingError(format!("re-parsing pooled certificate: {e}"))
        })?;
        let not_before_millis = cert.validity().not_before.timestamp() * 1000;

        write_u32(&mut body, TRUSTED_CERT_ENTRY_TAG);
        write_utf(&mut body, alias);
        write_u64(&mut body, not_before_millis as u64);
        write_utf(&mut body, CERT_TYPE);
        write_u32(&mut body, der.len() as u32);
        body.extend_from_slice(der);
    }

    let mac = compute_mac(password, &body);
    let mut out = body;
    out.extend_from_slice(&mac);
    Ok(out)
}

/// `SHA1(UTF-16BE(password) || "Mighty Aphrodite" || data)`, the JKS
/// keystore integrity digest.
fn compute_mac(password: &str, data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for unit in password.encode_utf16() {
        hasher.update(unit.to_be_bytes());
    }
    hasher.update(MAC_SALT.as_bytes());
    hasher.update(data);
    hasher.finalize().into()
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Java's `DataOutputStream.writeUTF`: a 2-byte big-endian length prefix
/// (in modified-UTF-8 bytes) followed by the encoded bytes. Every alias and
/// subject DN this controller ever writes is ASCII-safe, so UTF-8 and
/// modified UTF-8 coincide.
fn write_utf(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pool_with(fixtures: &[&str]) -> CertPool {
        let now = chrono::Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let mut pool = CertPool::new(false, now);
        for f in fixtures {
            pool.add(f.as_bytes()).unwrap();
        }
        pool
    }

    const CERT_A: &str = include_str!("../../tests/fixtures/cert_a.pem");
    const CERT_B: &str = include_str!("../../tests/fixtures/cert_b.pem");

    #[test]
    fn encode_starts_with_jks_magic() {
        let pool = pool_with(&[CERT_A]);
        let out = encode(&pool, "changeit").unwrap();
        assert_eq!(&out[0..4], &JKS_MAGIC.to_be_bytes());
        assert_eq!(&out[4..8], &JKS_VERSION.to_be_bytes());
    }

    #[test]
    fn encode_is_deterministic_for_same_pool_and_password() {
        let pool = pool_with(&[CERT_A, CERT_B]);
        let first = encode(&pool, "changeit").unwrap();
        let second = encode(&pool, "changeit").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn different_passwords_change_the_mac_only() {
        let pool = pool_with(&[CERT_A]);
        let a = encode(&pool, "changeit").unwrap();
        let b = encode(&pool, "other").unwrap();
        let body_len = a.len() - 20;
        assert_eq!(&a[..body_len], &b[..body_len]);
        assert_ne!(&a[body_len..], &b[body_len..]);
    }
}
