//! # Initialization
//!
//! Process startup: crypto provider, tracing, metrics registration, the
//! metrics/health HTTP server, the Kubernetes client, the default-CA
//! package, and the reconciler context.

use crate::config::ControllerConfig;
use crate::constants;
use crate::controller::reconciler::Reconciler;
use crate::crd::Bundle;
use crate::defaultca;
use crate::observability;
use crate::observability::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::Arc;
use tracing::info;

/// Everything `main` needs to start the watch loop.
pub struct InitializationResult {
    pub client: Client,
    pub bundles: Api<Bundle>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
}

/// Initialize the controller runtime: crypto provider, logging, metrics,
/// the probe/metrics server, the Kubernetes client, and the default-CA
/// package (if one was configured).
pub async fn initialize() -> Result<InitializationResult> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trust_bundle_controller=info".into()),
        )
        .init();

    info!("starting trust bundle controller");

    observability::metrics::register_metrics()?;

    let config = ControllerConfig::load();

    let default_ca = match &config.default_package_path {
        Some(path) => Some(defaultca::load(path).with_context(|| format!("loading default CA package from {path}"))?),
        None => None,
    };

    let server_state = Arc::new(ServerState::new());
    let server_state_for_task = server_state.clone();
    let server_port = config.metrics_port;

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_for_task).await {
            tracing::error!(error = %e, "metrics/health server error");
        }
    });

    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default().await.context("building Kubernetes client")?;
    let bundles: Api<Bundle> = Api::all(client.clone());

    let reconciler = Arc::new(Reconciler::new(client.clone(), config, default_ca));

    info!("controller initialized, starting watch loop");

    Ok(InitializationResult {
        client,
        bundles,
        reconciler,
        server_state,
    })
}

async fn wait_for_server_ready(server_state: &Arc<ServerState>, server_handle: &tokio::task::JoinHandle<()>) -> Result<()> {
    let timeout = std::time::Duration::from_secs(constants::DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = std::time::Duration::from_millis(constants::DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            anyhow::bail!("metrics/health server failed to start");
        }
        if server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            info!("metrics/health server is ready");
            return Ok(());
        }
        if start.elapsed() > timeout {
            anyhow::bail!("metrics/health server failed to become ready within {}s", timeout.as_secs());
        }
        tokio::time::sleep(poll_interval).await;
    }
}

