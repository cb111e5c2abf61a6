//! # Trust-Store Encoders
//!
//! Deterministic JKS and PKCS#12 serialisation of a [`CertPool`] with stable
//! per-certificate aliases.

pub mod jks;
pub mod pkcs12;

use crate::certpool::CertPool;
use crate::error::TrustBundleError;

/// A stable alias for a certificate: the first eight hex characters of its
/// DER-SHA-256 digest, a literal `|`, and its subject distinguished name in
/// canonical string form. Ordered to match the pool's canonical order.
pub fn aliases(pool: &CertPool) -> Result<Vec<String>, TrustBundleError> {
    pool.digests()
        .zip(pool.der_certificates())
        .map(|(digest, der)| {
            let (_, cert) = x509_parser::parse_x509_certificate(der).map_err(|e| {
                TrustBundleError::EncodingError(format!("re-parsing pooled certificate: {e}"))
            })?;
            let short_digest = hex_prefix(digest, 8);
            Ok(format!("{short_digest}|{}", cert.subject()))
        })
        .collect()
}

fn hex_prefix(digest: &[u8; 32], chars: usize) -> String {
    digest
        .iter()
        .take(chars.div_ceil(2))
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_prefix_is_eight_chars() {
        let digest = [0xABu8; 32];
        assert_eq!(hex_prefix(&digest, 8), "abababab");
    }
}
