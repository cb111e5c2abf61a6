//! # Constants
//!
//! Stable identifiers and tunables shared across the controller.

/// Field manager identifier this controller uses for server-side apply.
pub const FIELD_MANAGER: &str = "trust-manager";

/// Field managers whose client-side-apply `Update` entries the CSA→SSA
/// migration reclaims: the name client-go's HTTP client stamps onto
/// requests that never call through `Client::apply`, and this binary's own
/// name from before [`FIELD_MANAGER`] was introduced. Any other manager
/// holding an `Update` entry over a claimed key is left alone.
pub const LEGACY_FIELD_MANAGERS: &[&str] = &["Go-http-client", "trust-bundle-controller"];

/// Label carrying the owning bundle's name on every target object.
pub const LABEL_BUNDLE_NAME: &str = "trust.cert-manager.io/bundle-name";

/// Annotation carrying the hex SHA-256 of the emitted PEM on every target object.
pub const ANNOTATION_BUNDLE_HASH: &str = "trust.cert-manager.io/hash";

/// Default HTTP port for the metrics/health server.
pub const DEFAULT_METRICS_PORT: u16 = 9402;

/// Startup timeout waiting for the metrics/health server to bind.
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for server startup.
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Ceiling for exponential backoff requeues.
pub const MAX_BACKOFF_SECS: u64 = 300;

/// Base backoff used for the first retry after a failed reconciliation.
pub const BASE_BACKOFF_SECS: u64 = 1;
