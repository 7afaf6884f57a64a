//! ouo - OpenShift Upgrade Operator for OCM-managed clusters.
//!
//! Watches `OpenShiftUpgrade` CRD resources and converges each cluster on its
//! declared OpenShift version by scheduling, replacing or cancelling upgrade
//! policies through the OpenShift Cluster Manager API.

mod config;
mod controller;
mod crd;
mod error;
mod ocm;
mod status;
mod telemetry;
mod upgrade;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use futures::StreamExt;
use kube::runtime::Controller;
use kube::runtime::watcher;
use kube::{Api, CustomResourceExt};
use tracing::{error, info};

use controller::Context;
use crd::OpenShiftUpgrade;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

#[tokio::main]
async fn main() {
    // `ouo --crd` prints the CustomResourceDefinition and exits
    if std::env::args().nth(1).as_deref() == Some("--crd") {
        match serde_yaml::to_string(&OpenShiftUpgrade::crd()) {
            Ok(yaml) => print!("{yaml}"),
            Err(e) => {
                eprintln!("Failed to render CRD: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    // Initialize logging
    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting ouo v{} (commit: {}, build: {})",
        VERSION, COMMIT, BUILD_DATE
    );

    if let Err(e) = run().await {
        error!("Operator failed: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber with JSON format for production.
fn init_tracing() -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {e}"))?;

    fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .init();

    Ok(())
}

/// Main operator loop.
async fn run() -> Result<()> {
    let config = config::Config::from_env()?;
    info!(
        "Using OCM API at {} (start delay: {} min)",
        config.ocm_url,
        config.start_delay.num_minutes()
    );

    let ocm = ocm::OcmClient::new(
        &config.ocm_url,
        config.ocm_token.clone(),
        config.request_timeout,
    )
    .context("Failed to build OCM client")?;

    // Build in-cluster Kubernetes client
    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    // Initialize Prometheus metrics
    let mut registry = prometheus_client::registry::Registry::default();
    let metrics = Arc::new(telemetry::metrics::Metrics::new(&mut registry));
    let registry = Arc::new(registry);

    let health_state = telemetry::health::HealthState::new();
    let health_state_clone = health_state.clone();
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = telemetry::health::serve(health_port, health_state_clone).await {
            error!("Health server failed: {}", e);
        }
    });

    let registry_clone = registry.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = telemetry::metrics::serve(metrics_port, registry_clone).await {
            error!("Metrics server failed: {}", e);
        }
    });

    let api: Api<OpenShiftUpgrade> = Api::all(client.clone());

    let ctx = Arc::new(Context {
        kube_client: client.clone(),
        ocm: Arc::new(ocm),
        metrics,
        settings: config.engine_settings(),
        reconcile_timeout: config.reconcile_timeout,
    });

    // Mark as ready once controller starts
    health_state.set_ready(true);

    info!("Starting OpenShiftUpgrade controller");
    Controller::new(api, watcher::Config::default())
        .run(controller::reconcile, controller::error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok(o) => info!("Reconciled: {:?}", o),
                Err(e) => error!("Reconcile failed: {:?}", e),
            }
        })
        .await;

    Ok(())
}
