//! Prometheus metrics for the ouo operator.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

use crate::upgrade::Decision;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    pub cluster_id: String,
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ClusterLabels {
    pub cluster_id: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ScheduleLabels {
    pub cluster_id: String,
    pub version: String,
}

/// All Prometheus metrics for the operator.
pub struct Metrics {
    pub reconcile_total: Family<ReconcileLabels, Counter>,
    pub reconcile_duration_seconds: Family<ClusterLabels, Histogram>,
    pub upgrade_scheduled_total: Family<ScheduleLabels, Counter>,
    pub gate_agreements_total: Family<ClusterLabels, Counter>,
    pub policies_cancelled_total: Family<ClusterLabels, Counter>,
}

/// Reconciles are dominated by OCM round trips and the removal backoff.
const RECONCILE_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

impl Metrics {
    /// Create and register all metrics with the given registry.
    pub fn new(registry: &mut Registry) -> Self {
        let reconcile_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "ouo_reconcile",
            "Total number of reconcile calls",
            reconcile_total.clone(),
        );

        let reconcile_duration_seconds =
            Family::<ClusterLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(RECONCILE_BUCKETS.iter().copied())
            });
        registry.register(
            "ouo_reconcile_duration_seconds",
            "Duration of reconcile calls in seconds",
            reconcile_duration_seconds.clone(),
        );

        let upgrade_scheduled_total = Family::<ScheduleLabels, Counter>::default();
        registry.register(
            "ouo_upgrade_scheduled",
            "Total number of upgrade policies created",
            upgrade_scheduled_total.clone(),
        );

        let gate_agreements_total = Family::<ClusterLabels, Counter>::default();
        registry.register(
            "ouo_gate_agreements",
            "Total number of version gate agreements created",
            gate_agreements_total.clone(),
        );

        let policies_cancelled_total = Family::<ClusterLabels, Counter>::default();
        registry.register(
            "ouo_policies_cancelled",
            "Total number of queued upgrade policies cancelled",
            policies_cancelled_total.clone(),
        );

        Self {
            reconcile_total,
            reconcile_duration_seconds,
            upgrade_scheduled_total,
            gate_agreements_total,
            policies_cancelled_total,
        }
    }

    /// Count one reconcile and its duration.
    pub fn observe_reconcile(&self, cluster_id: &str, result: &str, seconds: f64) {
        self.reconcile_total
            .get_or_create(&ReconcileLabels {
                cluster_id: cluster_id.to_string(),
                result: result.to_string(),
            })
            .inc();
        self.reconcile_duration_seconds
            .get_or_create(&ClusterLabels {
                cluster_id: cluster_id.to_string(),
            })
            .observe(seconds);
    }

    /// Count the remote objects a decision created or removed.
    pub fn record_decision(&self, cluster_id: &str, decision: &Decision) {
        let cluster = ClusterLabels {
            cluster_id: cluster_id.to_string(),
        };
        let cancelled = match decision {
            Decision::NoOp { .. } => 0,
            Decision::Cancelled { policy_ids } => policy_ids.len(),
            Decision::AlreadyScheduled { cancelled, .. } => cancelled.len(),
            Decision::Scheduled {
                policy,
                agreements,
                cancelled,
            } => {
                self.upgrade_scheduled_total
                    .get_or_create(&ScheduleLabels {
                        cluster_id: cluster_id.to_string(),
                        version: policy.version.clone(),
                    })
                    .inc();
                self.gate_agreements_total
                    .get_or_create(&cluster)
                    .inc_by(agreements.len() as u64);
                cancelled.len()
            }
        };
        if cancelled > 0 {
            self.policies_cancelled_total
                .get_or_create(&cluster)
                .inc_by(cancelled as u64);
        }
    }
}

/// Axum handler that encodes the registry as OpenMetrics text.
async fn metrics_handler(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let mut buf = String::new();
    if encode(&mut buf, &registry).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics".to_string(),
        );
    }
    (StatusCode::OK, buf)
}

/// Start the metrics server on the given port.
pub async fn serve(port: u16, registry: Arc<Registry>) -> anyhow::Result<()> {
    use axum::Router;
    use axum::routing::get;
    use tokio::net::TcpListener;
    use tracing::info;

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Metrics server listening on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
