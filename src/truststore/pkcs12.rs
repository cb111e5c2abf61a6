//! # PKCS#12 Encoder
//!
//! Builds a PKCS#12 (PFX) trust store containing only certificate bags,
//! composing the DER structures from RFC 7292 by hand (they reduce to a
//! handful of fixed `SEQUENCE`/`OCTET STRING` shapes) and delegating the
//! cryptographic primitives to RustCrypto crates.
//!
//! Two password modes, matching JDK 18+ `PKCS12` provider conventions:
//!
//! - **Non-empty password**: certificate bags are wrapped in an
//!   `EncryptedData` content info, encrypted with
//!   `pbeWithSHAAnd40BitRC2-CBC`, and the PFX carries a `MacData` integrity
//!   digest (HMAC-SHA1 under a key derived the same PBE way).
//! - **Empty password**: certificate bags are stored as plain `data`
//!   content, unencrypted, and `MacData` is omitted entirely ("legacy" /
//!   integrity-less format).
//!
//! Determinism: the salt and IV are derived deterministically from the
//! certificate set itself (via SHA-256 over the sorted DER digests) rather
//! than drawn from an RNG, so the same pool and password always produce
//! byte-identical output.

use crate::certpool::CertPool;
use crate::error::TrustBundleError;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use sha2::Sha256;

const PBE_ITERATIONS: u32 = 2048;

// Well-known PKCS#7/PKCS#12 object identifiers, encoded as their complete
// DER `OBJECT IDENTIFIER` TLV (tag 0x06).
const OID_DATA: &[u8] = &[0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x01];
const OID_ENCRYPTED_DATA: &[u8] = &[0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x06];
const OID_CERT_BAG: &[u8] = &[
    0x06, 0x0B, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x0C, 0x0A, 0x01, 0x03,
];
const OID_X509_CERTIFICATE: &[u8] = &[
    0x06, 0x0A, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x16, 0x01,
];
const OID_FRIENDLY_NAME: &[u8] = &[0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x14];
const OID_PBE_SHA_RC2_40_CBC: &[u8] = &[
    0x06, 0x0A, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x0C, 0x01, 0x06,
];
const OID_SHA1: &[u8] = &[0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x1A];
const NULL: &[u8] = &[0x05, 0x00];

// --- minimal DER TLV composition -------------------------------------------------

fn der_len(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else {
        let bytes = len.to_be_bytes();
        let first_significant = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        let trimmed = &bytes[first_significant..];
        let mut out = vec![0x80 | trimmed.len() as u8];
        out.extend_from_slice(trimmed);
        out
    }
}

fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&der_len(content.len()));
    out.extend_from_slice(content);
    out
}

fn der_seq(children: &[u8]) -> Vec<u8> {
    der_tlv(0x30, children)
}

fn der_set(children: &[u8]) -> Vec<u8> {
    der_tlv(0x31, children)
}

fn der_octet_string(bytes: &[u8]) -> Vec<u8> {
    der_tlv(0x04, bytes)
}

fn der_integer_u64(v: u64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut trimmed = bytes[first_nonzero..].to_vec();
    if trimmed[0] & 0x80 != 0 {
        trimmed.insert(0, 0x00);
    }
    der_tlv(0x02, &trimmed)
}

fn der_bmp_string(s: &str) -> Vec<u8> {
    let mut content = Vec::with_capacity(s.len() * 2);
    for unit in s.encode_utf16() {
        content.extend_from_slice(&unit.to_be_bytes());
    }
    der_tlv(0x1E, &content)
}

/// `[n] EXPLICIT <inner>`, where `inner` is an already-encoded TLV.
fn der_explicit(tag_num: u8, inner_tlv: &[u8]) -> Vec<u8> {
    der_tlv(0xA0 | tag_num, inner_tlv)
}

/// `[n] IMPLICIT OCTET STRING`: a primitive context tag wrapping raw bytes.
fn der_context_primitive(tag_num: u8, content: &[u8]) -> Vec<u8> {
    der_tlv(0x80 | tag_num, content)
}

// --- PKCS#12 structure builders ---------------------------------------------------

fn attribute(oid: &[u8], value_tlv: &[u8]) -> Vec<u8> {
    der_seq(&[oid, &der_set(value_tlv)].concat())
}

fn safe_bag(cert_der: &[u8], alias: &str) -> Vec<u8> {
    let cert_value = der_explicit(0, &der_octet_string(cert_der));
    let cert_bag = der_seq(&[OID_X509_CERTIFICATE, &cert_value].concat());
    let bag_value = der_explicit(0, &cert_bag);
    let friendly_name = attribute(OID_FRIENDLY_NAME, &der_bmp_string(alias));
    let bag_attributes = der_set(&friendly_name);
    der_seq(&[OID_CERT_BAG, &bag_value, &bag_attributes].concat())
}

fn safe_contents(certs: &[(&[u8], String)]) -> Vec<u8> {
    let bags: Vec<u8> = certs
        .iter()
        .flat_map(|(der, alias)| safe_bag(der, alias))
        .collect();
    der_seq(&bags)
}

fn content_info(content_type_oid: &[u8], explicit_content: Option<&[u8]>) -> Vec<u8> {
    let mut body = content_type_oid.to_vec();
    if let Some(content) = explicit_content {
        body.extend_from_slice(&der_explicit(0, content));
    }
    der_seq(&body)
}

fn pbe_algorithm_identifier(salt: &[u8], iterations: u32) -> Vec<u8> {
    let params = der_seq(&[der_octet_string(salt), der_integer_u64(iterations as u64)].concat());
    der_seq(&[OID_PBE_SHA_RC2_40_CBC, &params].concat())
}

fn encrypted_content_info(ciphertext: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let alg = pbe_algorithm_identifier(salt, iterations);
    let encrypted_content = der_context_primitive(0, ciphertext);
    der_seq(&[OID_DATA, &alg, &encrypted_content].concat())
}

fn encrypted_data(ciphertext: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let eci = encrypted_content_info(ciphertext, salt, iterations);
    der_seq(&[der_integer_u64(0), &eci].concat())
}

fn mac_data(digest: &[u8; 20], mac_salt: &[u8], iterations: u32) -> Vec<u8> {
    let digest_algorithm = der_seq(&[OID_SHA1, NULL].concat());
    let digest_info = der_seq(&[digest_algorithm, der_octet_string(digest)].concat());
    der_seq(
        &[
            digest_info,
            der_octet_string(mac_salt),
            der_integer_u64(iterations as u64),
        ]
        .concat(),
    )
}

// --- RFC 7292 Appendix B key derivation --------------------------------------------

/// `ID` byte selecting which kind of key material `pbe_derive` produces.
mod derive_id {
    pub const KEY: u8 = 1;
    pub const IV: u8 = 2;
    pub const MAC: u8 = 3;
}

/// SHA-1 block size, per RFC 7292 Appendix B.
const V: usize = 64;
/// SHA-1 digest size.
const U: usize = 20;

fn fill_to_multiple(data: &[u8], block: usize) -> Vec<u8> {
    if data.is_empty() {
        return vec![0u8; block];
    }
    let total = data.len().div_ceil(block) * block;
    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        let take = (total - out.len()).min(data.len());
        out.extend_from_slice(&data[..take]);
    }
    out
}

fn add_one_with_carry(block: &mut [u8], addend: &[u8]) {
    let mut carry: u16 = 1;
    for i in (0..block.len()).rev() {
        let sum = u16::from(block[i]) + u16::from(addend[i]) + carry;
        block[i] = (sum & 0xFF) as u8;
        carry = sum >> 8;
    }
}

/// The PKCS#12 password-based key derivation function (RFC 7292 Appendix
/// B.2), producing `n` bytes of key material, IV, or MAC key depending on
/// `id`.
fn pbe_derive(password: &str, salt: &[u8], iterations: u32, id: u8, n: usize) -> Vec<u8> {
    let diversifier = vec![id; V];

    let mut password_utf16 = Vec::with_capacity(password.len() * 2 + 2);
    for unit in password.encode_utf16() {
        password_utf16.extend_from_slice(&unit.to_be_bytes());
    }
    password_utf16.extend_from_slice(&[0x00, 0x00]);

    let salt_block = fill_to_multiple(salt, V);
    let password_block = fill_to_multiple(&password_utf16, V);
    let mut i_blocks = salt_block;
    i_blocks.extend_from_slice(&password_block);

    let rounds = n.div_ceil(U);
    let mut output = Vec::with_capacity(rounds * U);

    for _ in 0..rounds {
        let mut a = {
            let mut hasher = Sha1::new();
            hasher.update(&diversifier);
            hasher.update(&i_blocks);
            hasher.finalize().to_vec()
        };
        for _ in 1..iterations.max(1) {
            let mut hasher = Sha1::new();
            hasher.update(&a);
            a = hasher.finalize().to_vec();
        }
        output.extend_from_slice(&a);

        let b = fill_to_multiple(&a, V);
        let block_count = i_blocks.len() / V;
        for block_idx in 0..block_count {
            let block = &mut i_blocks[block_idx * V..(block_idx + 1) * V];
            add_one_with_carry(block, &b);
        }
    }

    output.truncate(n);
    output
}

/// Deterministic salt derived from the certificate set itself, so repeated
/// encodes of the same pool (and only that pool) produce the same bytes.
fn deterministic_salt(pool: &CertPool, label: &[u8]) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(label);
    for digest in pool.digests() {
        hasher.update(digest);
    }
    let full = hasher.finalize();
    let mut salt = [0u8; 8];
    salt.copy_from_slice(&full[..8]);
    salt
}

type Rc2CbcEncryptor = cbc::Encryptor<rc2::Rc2>;

fn rc2_40_cbc_encrypt(key: &[u8; 5], iv: &[u8; 8], plaintext: &[u8]) -> Vec<u8> {
    Rc2CbcEncryptor::new(key.into(), iv.into())
        .encrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(plaintext)
}

/// Encode `pool` as a PKCS#12 trust store protected by `password`.
pub fn encode(pool: &CertPool, password: &str) -> Result<Vec<u8>, TrustBundleError> {
    let aliases = super::aliases(pool)?;
    let certs: Vec<(&[u8], String)> = pool.der_certificates().zip(aliases).collect();
    let safe_contents_der = safe_contents(&certs);

    let authenticated_safe_inner = if password.is_empty() {
        content_info(OID_DATA, Some(&der_octet_string(&safe_contents_der)))
    } else {
        let salt = deterministic_salt(pool, b"trust-bundle-controller/pkcs12/encryption");
        let key_material = pbe_derive(password, &salt, PBE_ITERATIONS, derive_id::KEY, 5);
        let iv_material = pbe_derive(password, &salt, PBE_ITERATIONS, derive_id::IV, 8);
        let key: [u8; 5] = key_material.try_into().map_err(|_| {
            TrustBundleError::EncodingError("derived RC2 key has unexpected length".to_string())
        })?;
        let iv: [u8; 8] = iv_material.try_into().map_err(|_| {
            TrustBundleError::EncodingError("derived IV has unexpected length".to_string())
        })?;
        let ciphertext = rc2_40_cbc_encrypt(&key, &iv, &safe_contents_der);
        let encrypted_data_der = encrypted_data(&ciphertext, &salt, PBE_ITERATIONS);
        content_info(OID_ENCRYPTED_DATA, Some(&encrypted_data_der))
    };

    let authenticated_safe_der = der_seq(&authenticated_safe_inner);
    let auth_safe_content_info =
        content_info(OID_DATA, Some(&der_octet_string(&authenticated_safe_der)));

    let mac_data_der = if password.is_empty() {
        Vec::new()
    } else {
        let mac_salt = deterministic_salt(pool, b"trust-bundle-controller/pkcs12/mac");
        let mac_key = pbe_derive(password, &mac_salt, PBE_ITERATIONS, derive_id::MAC, 20);
        let mut mac = Hmac::<Sha1>::new_from_slice(&mac_key).map_err(|e| {
            TrustBundleError::EncodingError(format!("building PKCS#12 MAC key: {e}"))
        })?;
        mac.update(&authenticated_safe_der);
        let digest: [u8; 20] = mac.finalize().into_bytes().into();
        mac_data(&digest, &mac_salt, PBE_ITERATIONS)
    };

    let mut pfx_body = der_integer_u64(3);
    pfx_body.extend_from_slice(&auth_safe_content_info);
    pfx_body.extend_from_slice(&mac_data_der);
    Ok(der_seq(&pfx_body))
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
    fn encode_starts_with_sequence_tag() {
        let pool = pool_with(&[CERT_A]);
        let out = encode(&pool, "").unwrap();
        assert_eq!(out[0], 0x30);
    }

    #[test]
    fn encode_is_deterministic_password_less() {
        let pool = pool_with(&[CERT_A, CERT_B]);
        assert_eq!(encode(&pool, "").unwrap(), encode(&pool, "").unwrap());
    }

    #[test]
    fn encode_is_deterministic_with_password() {
        let pool = pool_with(&[CERT_A, CERT_B]);
        assert_eq!(
            encode(&pool, "changeit").unwrap(),
            encode(&pool, "changeit").unwrap()
        );
    }

    #[test]
    fn empty_password_produces_shorter_integrity_less_output() {
        let pool = pool_with(&[CERT_A]);
        let plain = encode(&pool, "").unwrap();
        let protected = encode(&pool, "changeit").unwrap();
        // The password-less form has no MacData trailer and no RC2 padding
        // overhead, so it is never larger than the protected form.
        assert!(plain.len() <= protected.len());
    }

    #[test]
    fn pbe_derive_is_deterministic_and_length_exact() {
        let a = pbe_derive("changeit", b"salt1234", 2048, derive_id::KEY, 5);
        let b = pbe_derive("changeit", b"salt1234", 2048, derive_id::KEY, 5);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }
}
