//! # Custom Resource Definitions
//!
//! CRD types for the trust bundle controller: the cluster-scoped `Bundle`
//! resource and its nested source/target specifications.

pub mod status;

pub use status::BundleStatus;

use crate::selector::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

/// `Bundle` Custom Resource Definition
///
/// A cluster-scoped resource that names one or more PEM sources, optionally
/// mixes in a default CA package, and asks the controller to publish the
/// concatenated trust store (and any additional binary encodings) into a
/// namespaced `ConfigMap` and/or `Secret` in every namespace matching a
/// label selector.
///
/// # Example
///
/// ```yaml
/// apiVersion: trust.cert-manager.io/v1alpha1
/// kind: Bundle
/// metadata:
///   name: example-trust-bundle
/// spec:
///   sources:
///     - useDefaultCAs: true
///     - configMap:
///         name: extra-ca
///         key: ca.pem
///   target:
///     configMap:
///       key: root-certs.pem
///     namespaceSelector:
///       matchLabels:
///         trust-bundle-injection: enabled
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Bundle",
    group = "trust.cert-manager.io",
    version = "v1alpha1",
    status = "BundleStatus",
    shortname = "bundle",
    printcolumn = r#"{"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"Reason", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BundleSpec {
    /// Ordered sequence of PEM sources. Evaluated and concatenated in order
    /// into a single certificate pool.
    pub sources: Vec<BundleSourceSpec>,
    /// Where (and in what additional formats) the resolved trust bundle is
    /// published.
    pub target: BundleTargetSpec,
}

/// One source entry. Exactly one of the four fields must be populated.
/// Modelled as a struct-of-options rather than an
/// internally tagged enum because the Kubernetes OpenAPI schema generated
/// for a CRD cannot express "exactly one of" as a wire format; the
/// invariant is instead enforced by [`BundleSourceSpec::variant`], which is
/// the sole place the four fields are inspected together.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BundleSourceSpec {
    /// Literal PEM bytes, included verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_line: Option<String>,
    /// If true, mix in the default CA package loaded at controller startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_default_cas: Option<bool>,
    /// Fetch PEM bytes from a `ConfigMap` in the trust namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ObjectSourceSpec>,
    /// Fetch PEM bytes from a `Secret` in the trust namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<ObjectSourceSpec>,
}

/// A source that selects an object by name or by label selector, and reads
/// either a single key or all keys from it.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSourceSpec {
    /// Exact object name. Exactly one of `name`/`selector` must be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Label selector matching zero or more objects. Exactly one of
    /// `name`/`selector` must be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    /// Single data key to read. Exactly one of `key`/`includeAllKeys` must
    /// be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Concatenate every key's value. Rejected for `kubernetes.io/tls`
    /// secrets, since that would leak the private key.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_all_keys: bool,
}

/// Where the resolved bundle is published, and in which additional formats.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BundleTargetSpec {
    /// If set, publish PEM into a `ConfigMap` under this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<TargetKeySpec>,
    /// If set, publish PEM into a `Secret` under this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<TargetKeySpec>,
    /// Optional JKS/PKCS#12 encodings, written alongside PEM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_formats: Option<AdditionalFormatsSpec>,
    /// Namespaces to publish into. An unset selector (or one with no match
    /// labels/expressions) matches every namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,
}

/// A data-entry key name.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetKeySpec {
    /// Name of the `data`/`binaryData` entry the PEM is written under.
    pub key: String,
}

/// Additional binary trust-store encodings to publish alongside PEM.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalFormatsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jks: Option<JksFormatSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkcs12: Option<Pkcs12FormatSpec>,
}

fn default_jks_password() -> String {
    "changeit".to_string()
}

/// JKS output configuration. Default password matches the JVM convention.
///
/// `password` is zeroized on drop; it passes through this struct only long
/// enough to reach [`crate::truststore::jks::encode`].
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct JksFormatSpec {
    #[zeroize(skip)]
    pub key: String,
    #[serde(default = "default_jks_password")]
    pub password: String,
}

/// PKCS#12 output configuration. Default password is empty, which produces
/// a password-less (integrity-less) store per JDK 18+ conventions.
///
/// `password` is zeroized on drop, same as [`JksFormatSpec`].
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct Pkcs12FormatSpec {
    #[zeroize(skip)]
    pub key: String,
    #[serde(default)]
    pub password: String,
}

/// The four source variants as a proper sum type, with the "exactly one
/// populated" invariant already checked. This is the type the source
/// resolver actually dispatches on.
#[derive(Debug, Clone)]
pub enum SourceVariant<'a> {
    InLine(&'a str),
    UseDefaultCAs(bool),
    ConfigMap(&'a ObjectSourceSpec),
    Secret(&'a ObjectSourceSpec),
}

/// Error returned when a `BundleSourceSpec` or `ObjectSourceSpec` violates
/// its "exactly one populated" invariant.
#[derive(Debug, thiserror::Error)]
pub enum SourceSpecError {
    #[error("source entry must populate exactly one of inLine, useDefaultCAs, configMap, secret")]
    SourceVariant,
    #[error("object source must populate exactly one of name, selector")]
    ObjectSelector,
    #[error("object source must populate exactly one of key, includeAllKeys")]
    ObjectKey,
}

impl BundleSourceSpec {
    /// Resolve the exactly-one-populated sum type, or fail the invariant.
    pub fn variant(&self) -> Result<SourceVariant<'_>, SourceSpecError> {
        let populated = [
            self.in_line.is_some(),
            self.use_default_cas.is_some(),
            self.config_map.is_some(),
            self.secret.is_some(),
        ]
        .into_iter()
        .filter(|p| *p)
        .count();

        if populated != 1 {
            return Err(SourceSpecError::SourceVariant);
        }

        if let Some(v) = &self.in_line {
            Ok(SourceVariant::InLine(v))
        } else if let Some(v) = self.use_default_cas {
            Ok(SourceVariant::UseDefaultCAs(v))
        } else if let Some(v) = &self.config_map {
            Ok(SourceVariant::ConfigMap(v))
        } else if let Some(v) = &self.secret {
            Ok(SourceVariant::Secret(v))
        } else {
            unreachable!("populated count checked above")
        }
    }
}

/// Which object the source names: by exact name, or by label selector.
#[derive(Debug, Clone)]
pub enum ObjectSelector<'a> {
    Name(&'a str),
    Selector(&'a LabelSelector),
}

/// Which keys to read: a single named key, or every key concatenated.
#[derive(Debug, Clone, Copy)]
pub enum ObjectKeySelection<'a> {
    Key(&'a str),
    IncludeAllKeys,
}

impl ObjectSourceSpec {
    pub fn object_selector(&self) -> Result<ObjectSelector<'_>, SourceSpecError> {
        match (&self.name, &self.selector) {
            (Some(name), None) => Ok(ObjectSelector::Name(name)),
            (None, Some(selector)) => Ok(ObjectSelector::Selector(selector)),
            _ => Err(SourceSpecError::ObjectSelector),
        }
    }

    pub fn key_selection(&self) -> Result<ObjectKeySelection<'_>, SourceSpecError> {
        match (&self.key, self.include_all_keys) {
            (Some(key), false) => Ok(ObjectKeySelection::Key(key)),
            (None, true) => Ok(ObjectKeySelection::IncludeAllKeys),
            _ => Err(SourceSpecError::ObjectKey),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_source() -> BundleSourceSpec {
        BundleSourceSpec {
            in_line: None,
            use_default_cas: None,
            config_map: None,
            secret: None,
        }
    }

    #[test]
    fn variant_rejects_zero_populated() {
        assert!(matches!(
            empty_source().variant(),
            Err(SourceSpecError::SourceVariant)
        ));
    }

    #[test]
    fn variant_rejects_multiple_populated() {
        let mut s = empty_source();
        s.in_line = Some("x".into());
        s.use_default_cas = Some(true);
        assert!(matches!(s.variant(), Err(SourceSpecError::SourceVariant)));
    }

    #[test]
    fn variant_accepts_single_populated() {
        let mut s = empty_source();
        s.in_line = Some("pem".into());
        assert!(matches!(s.variant(), Ok(SourceVariant::InLine("pem"))));
    }

    #[test]
    fn object_source_requires_exactly_one_selector() {
        let obj = ObjectSourceSpec {
            name: Some("a".into()),
            selector: Some(LabelSelector::default()),
            key: Some("k".into()),
            include_all_keys: false,
        };
        assert!(matches!(
            obj.object_selector(),
            Err(SourceSpecError::ObjectSelector)
        ));
    }

    #[test]
    fn object_source_requires_exactly_one_key_mode() {
        let obj = ObjectSourceSpec {
            name: Some("a".into()),
            selector: None,
            key: Some("k".into()),
            include_all_keys: true,
        };
        assert!(matches!(
            obj.key_selection(),
            Err(SourceSpecError::ObjectKey)
        ));
    }
}
