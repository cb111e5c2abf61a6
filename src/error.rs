//! # Error Taxonomy
//!
//! A single `thiserror` enum shared by the source resolver, target
//! reconciler, and bundle reconciler. Each variant documents how the
//! top-level loop is expected to react to it; the reaction itself lives in
//! `controller::reconciler` and `runtime::error_policy`.

use thiserror::Error;

/// Errors surfaced while resolving sources, encoding trust stores, or
/// syncing targets.
#[derive(Debug, Error)]
pub enum TrustBundleError {
    /// A required source object, key, or the default-CA package is absent.
    /// Surfaced as `Synced=False reason=SourceNotFound`; no requeue is
    /// requested because a watch event will re-trigger reconciliation.
    #[error("source not found: {0}")]
    NotFound(String),

    /// A source's bytes did not parse as PEM-encoded `CERTIFICATE` blocks.
    /// Backoff-requeued with a warning event.
    #[error("invalid source PEM: {0}")]
    InvalidSourcePEM(String),

    /// `includeAllKeys` was requested against a `kubernetes.io/tls` secret.
    /// Surfaced as `Synced=False reason=InvalidSecretSource`; no requeue.
    #[error("secret source would leak a private key: {0}")]
    InvalidSecretSource(String),

    /// The JKS/PKCS#12 encoder failed. Treated as transient; backoff-requeued.
    #[error("trust-store encoding failed: {0}")]
    EncodingError(String),

    /// Any failure talking to the cluster API. Backoff-requeued.
    #[error("cluster API error: {0}")]
    APIError(#[from] kube::Error),
}

impl TrustBundleError {
    /// The `reason` string to attach to the `Synced` condition / event, if
    /// this error is user-visible rather than purely internal.
    pub fn condition_reason(&self) -> Option<&'static str> {
        match self {
            Self::NotFound(_) => Some("SourceNotFound"),
            Self::InvalidSecretSource(_) => Some("InvalidSecretSource"),
            _ => None,
        }
    }
}
