//! # Default CA Package
//!
//! Loads the default-CA package from disk once, at startup — the only
//! blocking I/O the controller performs outside the Kubernetes API. The
//! on-disk shape is intentionally treated as opaque outside this module:
//! only its `version` identifier and concatenated PEM bytes matter to the
//! rest of the controller.
//!
//! The package is a small JSON document:
//!
//! ```json
//! { "version": "v2", "pem": "-----BEGIN CERTIFICATE-----\n...\n" }
//! ```

use crate::error::TrustBundleError;
use serde::Deserialize;

/// The default-CA package loaded once at controller startup, then shared
/// freely as an immutable value.
#[derive(Debug, Clone)]
pub struct DefaultCaPackage {
    /// Opaque identifier round-tripped into `status.defaultCAPackageVersion`.
    pub version: String,
    /// Concatenated PEM bytes, fed into the certificate pool like any other
    /// source.
    pub pem: String,
}

#[derive(Debug, Deserialize)]
struct PackageFile {
    version: String,
    pem: String,
}

/// Load the default-CA package from `path`. Returns `Ok(None)` only if the
/// caller was not configured with a path at all; a configured path that
/// cannot be read or parsed is an error (the controller fails fast at
/// startup rather than silently running without default CAs).
pub fn load(path: &str) -> Result<DefaultCaPackage, TrustBundleError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        TrustBundleError::NotFound(format!("reading default CA package {path}: {e}"))
    })?;
    let parsed: PackageFile = serde_json::from_str(&raw).map_err(|e| {
        TrustBundleError::NotFound(format!("parsing default CA package {path}: {e}"))
    })?;
    Ok(DefaultCaPackage {
        version: parsed.version,
        pem: parsed.pem,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_reads_version_and_pem() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"version":"v2","pem":"-----BEGIN CERTIFICATE-----\nAA\n-----END CERTIFICATE-----\n"}}"#).unwrap();
        let pkg = load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(pkg.version, "v2");
        assert!(pkg.pem.starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn load_fails_on_missing_file() {
        let err = load("/nonexistent/path/package.json").unwrap_err();
        assert!(matches!(err, TrustBundleError::NotFound(_)));
    }
}
