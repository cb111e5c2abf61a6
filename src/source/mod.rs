//! # Source Resolver
//!
//! Gathers PEM bytes from in-line values, the default CA package, and
//! `ConfigMap`/`Secret` objects (by name or label selector) in the trust
//! namespace, feeds them all into a single [`CertPool`], and runs the
//! requested additional trust-store encoders.

use crate::certpool::CertPool;
use crate::crd::{
    AdditionalFormatsSpec, BundleSourceSpec, ObjectKeySelection, ObjectSelector, ObjectSourceSpec,
    SourceVariant,
};
use crate::defaultca::DefaultCaPackage;
use crate::error::TrustBundleError;
use crate::selector;
use crate::truststore::{jks, pkcs12};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, ListParams};
use std::collections::BTreeMap;

/// Output of a successful source resolution: canonical PEM text, any
/// requested additional binary encodings, and the default-CA package
/// identifier if one was actually used.
#[derive(Debug, Clone)]
pub struct ResolvedBundle {
    pub pem: String,
    pub binary: BTreeMap<String, Vec<u8>>,
    pub default_ca_id: Option<String>,
}

/// Resolve `sources` into a [`ResolvedBundle`], in spec order, against the
/// single configured trust namespace.
pub async fn build(
    client: &kube::Client,
    trust_namespace: &str,
    sources: &[BundleSourceSpec],
    additional_formats: Option<&AdditionalFormatsSpec>,
    default_ca: Option<&DefaultCaPackage>,
    filter_expired: bool,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<ResolvedBundle, TrustBundleError> {
    let configmaps: Api<ConfigMap> = Api::namespaced(client.clone(), trust_namespace);
    let secrets: Api<Secret> = Api::namespaced(client.clone(), trust_namespace);

    let mut pool = CertPool::new(filter_expired, now);
    let mut default_ca_id = None;

    for source in sources {
        let variant = source
            .variant()
            .map_err(|e| TrustBundleError::InvalidSourcePEM(e.to_string()))?;

        match variant {
            SourceVariant::InLine(pem) => {
                pool.add(pem.as_bytes())?;
            }
            SourceVariant::UseDefaultCAs(false) => {}
            SourceVariant::UseDefaultCAs(true) => {
                let package = default_ca.ok_or_else(|| {
                    TrustBundleError::NotFound(
                        "useDefaultCAs requested but no default CA package was loaded".to_string(),
                    )
                })?;
                pool.add(package.pem.as_bytes())?;
                default_ca_id = Some(package.version.clone());
            }
            SourceVariant::ConfigMap(obj) => {
                if let Some(bytes) = resolve_configmap_source(&configmaps, obj).await? {
                    pool.add(&bytes)?;
                }
            }
            SourceVariant::Secret(obj) => {
                if let Some(bytes) = resolve_secret_source(&secrets, obj).await? {
                    pool.add(&bytes)?;
                }
            }
        }
    }

    if pool.is_empty() {
        return Err(TrustBundleError::NotFound(
            "no source produced any certificate".to_string(),
        ));
    }

    let pem = pool.pem();
    let mut binary = BTreeMap::new();
    if let Some(formats) = additional_formats {
        if let Some(jks_spec) = &formats.jks {
            let encoded = jks::encode(&pool, &jks_spec.password)?;
            binary.insert(jks_spec.key.clone(), encoded);
        }
        if let Some(pkcs12_spec) = &formats.pkcs12 {
            let encoded = pkcs12::encode(&pool, &pkcs12_spec.password)?;
            binary.insert(pkcs12_spec.key.clone(), encoded);
        }
    }

    Ok(ResolvedBundle {
        pem,
        binary,
        default_ca_id,
    })
}

/// Fetch the `ConfigMap`(s) named or selected by `obj`, merge their data
/// according to `obj`'s key selection, and return the concatenated bytes.
/// `Ok(None)` means "skip this source" (an empty selector match).
async fn resolve_configmap_source(
    api: &Api<ConfigMap>,
    obj: &ObjectSourceSpec,
) -> Result<Option<Vec<u8>>, TrustBundleError> {
    let key_selection = obj
        .key_selection()
        .map_err(|e| TrustBundleError::InvalidSourcePEM(e.to_string()))?;

    let objects = match obj
        .object_selector()
        .map_err(|e| TrustBundleError::InvalidSourcePEM(e.to_string()))?
    {
        ObjectSelector::Name(name) => {
            let cm = api.get(name).await.map_err(|e| match e {
                kube::Error::Api(api_err) if api_err.code == 404 => {
                    TrustBundleError::NotFound(format!("configMap {name} not found"))
                }
                other => TrustBundleError::APIError(other),
            })?;
            vec![cm]
        }
        ObjectSelector::Selector(label_selector) => {
            let list = api
                .list(&ListParams::default())
                .await
                .map_err(TrustBundleError::APIError)?;
            list.items
                .into_iter()
                .filter(|cm| {
                    let labels = cm.metadata.labels.clone().unwrap_or_default().into_iter().collect();
                    selector::matches(Some(label_selector), &labels)
                })
                .collect()
        }
    };

    if objects.is_empty() {
        tracing::info!("configMap source selector matched no objects, skipping");
        return Ok(None);
    }

    let mut combined = Vec::new();
    for cm in &objects {
        let name = cm.metadata.name.clone().unwrap_or_default();
        match key_selection {
            ObjectKeySelection::Key(key) => {
                let value = cm
                    .data
                    .as_ref()
                    .and_then(|d| d.get(key))
                    .map(|s| s.as_bytes().to_vec())
                    .or_else(|| cm.binary_data.as_ref().and_then(|d| d.get(key)).map(|b| b.0.clone()))
                    .ok_or_else(|| {
                        TrustBundleError::NotFound(format!("key {key} not found in configMap {name}"))
                    })?;
                combined.extend_from_slice(&value);
            }
            ObjectKeySelection::IncludeAllKeys => {
                for value in all_configmap_values(cm) {
                    combined.extend_from_slice(&value);
                }
            }
        }
    }

    Ok(Some(combined))
}

/// All `data`/`binaryData` values of a `ConfigMap`, ordered by key for
/// determinism.
fn all_configmap_values(cm: &ConfigMap) -> Vec<Vec<u8>> {
    let mut entries: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    if let Some(data) = &cm.data {
        for (k, v) in data {
            entries.insert(k.clone(), v.as_bytes().to_vec());
        }
    }
    if let Some(binary_data) = &cm.binary_data {
        for (k, v) in binary_data {
            entries.insert(k.clone(), v.0.clone());
        }
    }
    entries.into_values().collect()
}

/// Fetch the `Secret`(s) named or selected by `obj`. Rejects
/// `includeAllKeys` against any `kubernetes.io/tls` secret, since that would
/// leak the private key into the resolved trust bundle.
async fn resolve_secret_source(
    api: &Api<Secret>,
    obj: &ObjectSourceSpec,
) -> Result<Option<Vec<u8>>, TrustBundleError> {
    let key_selection = obj
        .key_selection()
        .map_err(|e| TrustBundleError::InvalidSourcePEM(e.to_string()))?;

    let objects = match obj
        .object_selector()
        .map_err(|e| TrustBundleError::InvalidSourcePEM(e.to_string()))?
    {
        ObjectSelector::Name(name) => {
            let secret = api.get(name).await.map_err(|e| match e {
                kube::Error::Api(api_err) if api_err.code == 404 => {
                    TrustBundleError::NotFound(format!("secret {name} not found"))
                }
                other => TrustBundleError::APIError(other),
            })?;
            vec![secret]
        }
        ObjectSelector::Selector(label_selector) => {
            let list = api
                .list(&ListParams::default())
                .await
                .map_err(TrustBundleError::APIError)?;
            list.items
                .into_iter()
                .filter(|secret| {
                    let labels = secret.metadata.labels.clone().unwrap_or_default().into_iter().collect();
                    selector::matches(Some(label_selector), &labels)
                })
                .collect()
        }
    };

    if objects.is_empty() {
        tracing::info!("secret source selector matched no objects, skipping");
        return Ok(None);
    }

    let mut combined = Vec::new();
    for secret in &objects {
        let name = secret.metadata.name.clone().unwrap_or_default();
        let is_tls = secret.type_.as_deref() == Some("kubernetes.io/tls");

        match key_selection {
            ObjectKeySelection::Key(key) => {
                let value = secret
                    .data
                    .as_ref()
                    .and_then(|d| d.get(key))
                    .map(|b| b.0.clone())
                    .ok_or_else(|| {
                        TrustBundleError::NotFound(format!("key {key} not found in secret {name}"))
                    })?;
                combined.extend_from_slice(&value);
            }
            ObjectKeySelection::IncludeAllKeys => {
                if is_tls {
                    return Err(TrustBundleError::InvalidSecretSource(format!(
                        "includeAllKeys is not permitted against TLS secret {name}"
                    )));
                }
                if let Some(data) = &secret.data {
                    let mut sorted: Vec<_> = data.iter().collect();
                    sorted.sort_by(|a, b| a.0.cmp(b.0));
                    for (_, value) in sorted {
                        combined.extend_from_slice(&value.0);
                    }
                }
            }
        }
    }

    Ok(Some(combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    #[test]
    fn all_configmap_values_merges_data_and_binary_data_in_key_order() {
        let mut data = BTreeMap::new();
        data.insert("b.pem".to_string(), "second".to_string());
        let mut cm = ConfigMap::default();
        cm.data = Some(data);
        cm.binary_data = Some({
            let mut m = BTreeMap::new();
            m.insert(
                "a.pem".to_string(),
                k8s_openapi::ByteString(b"first".to_vec()),
            );
            m
        });
        let values = all_configmap_values(&cm);
        assert_eq!(values, vec![b"first".to_vec(), b"second".to_vec()]);
    }
}
