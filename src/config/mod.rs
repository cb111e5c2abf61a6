//! # Controller Configuration
//!
//! Command-line flags (with environment-variable fallbacks), using the
//! `clap::Parser` + `env` convention for every tunable in this controller.

use clap::Parser;

/// Runtime configuration recognised by the trust bundle controller.
#[derive(Parser, Debug, Clone)]
#[command(name = "trust-bundle-controller", about = "Trust bundle controller")]
pub struct ControllerConfig {
    /// The single namespace scanned for `configMap`/`secret` source objects.
    #[arg(long, env = "TRUST_NAMESPACE", default_value = "cert-manager")]
    pub trust_namespace: String,

    /// Filesystem path to the default-CA package. If unset, any source with
    /// `useDefaultCAs: true` fails with `NotFound`.
    #[arg(long, env = "DEFAULT_PACKAGE_PATH")]
    pub default_package_path: Option<String>,

    /// Whether `spec.target.secret` is honoured. When false, bundles
    /// requesting a `Secret` target are rejected with
    /// `SecretTargetsDisabled`.
    #[arg(long, env = "SECRET_TARGETS_ENABLED", default_value_t = false)]
    pub secret_targets_enabled: bool,

    /// Whether expired certificates are silently dropped from every
    /// resolved pool.
    #[arg(long, env = "FILTER_EXPIRED_CERTS", default_value_t = true)]
    pub filter_expired_certs: bool,

    /// Port the metrics/health HTTP server binds to.
    #[arg(long, env = "METRICS_PORT", default_value_t = crate::constants::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
}

impl ControllerConfig {
    /// Parse from `std::env::args()`, falling back to environment variables
    /// per-field as declared above.
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_secret_targets_and_enable_expiry_filtering() {
        let cfg = ControllerConfig::parse_from(["trust-bundle-controller"]);
        assert!(!cfg.secret_targets_enabled);
        assert!(cfg.filter_expired_certs);
        assert_eq!(cfg.trust_namespace, "cert-manager");
        assert!(cfg.default_package_path.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = ControllerConfig::parse_from([
            "trust-bundle-controller",
            "--trust-namespace",
            "trust-system",
            "--secret-targets-enabled",
            "true",
            "--default-package-path",
            "/etc/trust/package.json",
        ]);
        assert_eq!(cfg.trust_namespace, "trust-system");
        assert!(cfg.secret_targets_enabled);
        assert_eq!(cfg.default_package_path.as_deref(), Some("/etc/trust/package.json"));
    }
}
