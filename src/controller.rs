//! OpenShiftUpgrade controller - reconcile dispatch and error policy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use kube::Api;
use kube::runtime::controller::Action;
use tracing::{error, info, warn};

use crate::crd::{OpenShiftUpgrade, OpenShiftUpgradeSpec, UpgradePhase};
use crate::error::OuoError;
use crate::ocm::ClusterManagementClient;
use crate::status;
use crate::telemetry::metrics::Metrics;
use crate::upgrade::version::remote_version_id;
use crate::upgrade::{
    ClusterVersionState, Decision, EngineSettings, UpgradeDecisionEngine, VersionCatalog,
};

/// Requeue interval while an upgrade is scheduled or the versions are unknown.
const POLL_INTERVAL: Duration = Duration::from_secs(300);
/// Requeue interval once converged, to notice out-of-band version changes.
const DRIFT_INTERVAL: Duration = Duration::from_secs(3600);
const TRANSIENT_RETRY: Duration = Duration::from_secs(10);

/// Shared context for the controller.
pub struct Context {
    pub kube_client: kube::Client,
    pub ocm: Arc<dyn ClusterManagementClient>,
    pub metrics: Arc<Metrics>,
    pub settings: EngineSettings,
    pub reconcile_timeout: Duration,
}

/// Result of one pass of the upgrade engine for a resource.
#[derive(Debug)]
pub struct Outcome {
    pub current_version: Option<String>,
    pub decision: Decision,
}

/// Read the cluster, check the declaration and run the upgrade engine once.
///
/// A changed `version` is looked up in the catalog first so that a version
/// that is not offered at all is reported before anything else happens.
pub async fn reconcile_cluster<C: ClusterManagementClient + ?Sized>(
    client: &C,
    settings: EngineSettings,
    spec: &OpenShiftUpgradeSpec,
    last_requested: Option<&str>,
) -> Result<Outcome, OuoError> {
    let target = spec.target();
    let desired = spec
        .version
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(version) = desired
        && last_requested != Some(version)
    {
        VersionCatalog::new(client, target.topology)
            .resolve_requested_version(&spec.channel_group, Some(version))
            .await?;
    }

    let cluster = client
        .get_cluster(&target.id)
        .await
        .map_err(|source| OuoError::ClusterLookup {
            cluster_id: target.id.clone(),
            source,
        })?;
    let (current_version, current_version_id) = match cluster.version {
        Some(v) if !v.raw_id.is_empty() => {
            let id = if v.id.is_empty() {
                remote_version_id(&v.raw_id, &v.channel_group)
            } else {
                v.id
            };
            (Some(v.raw_id), Some(id))
        }
        _ => (None, None),
    };

    let state = ClusterVersionState {
        current_version: current_version.clone(),
        current_version_id,
        desired_version: desired.map(ToString::to_string),
        channel_group: spec.channel_group.clone(),
        previously_requested_version: last_requested.map(ToString::to_string),
    };
    let decision = UpgradeDecisionEngine::new(client, settings)
        .reconcile_version(
            &target,
            &state,
            spec.upgrade_acknowledgements_for.as_deref(),
        )
        .await?;

    Ok(Outcome {
        current_version,
        decision,
    })
}

/// [`reconcile_cluster`] bounded by `deadline`.
///
/// An expired deadline drops the pass mid-flight. Remote objects it already
/// created stay in place and the next pass picks up from them.
pub async fn reconcile_with_deadline<C: ClusterManagementClient + ?Sized>(
    client: &C,
    settings: EngineSettings,
    spec: &OpenShiftUpgradeSpec,
    last_requested: Option<&str>,
    deadline: Duration,
) -> Result<Outcome, OuoError> {
    tokio::time::timeout(
        deadline,
        reconcile_cluster(client, settings, spec, last_requested),
    )
    .await
    .unwrap_or_else(|_| Err(OuoError::ReconcileTimeout(deadline.as_secs())))
}

/// Reconcile an OpenShiftUpgrade resource.
pub async fn reconcile(
    obj: Arc<OpenShiftUpgrade>,
    ctx: Arc<Context>,
) -> Result<Action, kube::Error> {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let api: Api<OpenShiftUpgrade> = Api::all(ctx.kube_client.clone());

    let spec = &obj.spec;
    let mut new_status = obj.status.clone().unwrap_or_default();
    let previous_phase = new_status.phase;
    let previous_message = new_status.message.clone();

    info!(
        "Reconciling {} (cluster: {}, desired: {})",
        name,
        spec.cluster_id,
        spec.version.as_deref().unwrap_or("unset")
    );

    let started = Instant::now();
    let result = reconcile_with_deadline(
        ctx.ocm.as_ref(),
        ctx.settings,
        spec,
        new_status.last_requested_version.as_deref(),
        ctx.reconcile_timeout,
    )
    .await;
    let elapsed = started.elapsed().as_secs_f64();

    new_status.observed_generation = obj.metadata.generation.unwrap_or(0);
    new_status.last_reconciled_at = Some(Utc::now());
    let recorder = status::EventRecorder::new(ctx.kube_client.clone(), &obj);

    match result {
        Ok(outcome) => {
            ctx.metrics
                .observe_reconcile(&spec.cluster_id, "success", elapsed);
            ctx.metrics
                .record_decision(&spec.cluster_id, &outcome.decision);

            if outcome.current_version.is_some() {
                new_status.current_version = outcome.current_version;
            }
            new_status.last_requested_version = spec.version.clone();
            status::record_decision(&mut new_status, &outcome.decision);
            info!("Reconciled {}: {}", name, outcome.decision);

            if let Err(e) = status::patch_status(&api, name, &new_status).await {
                warn!("Failed to patch status for {}: {}", name, e);
                return Ok(Action::requeue(Duration::from_secs(5)));
            }

            let message = outcome.decision.to_string();
            match &outcome.decision {
                Decision::Scheduled { .. } => recorder.publish("UpgradeScheduled", &message).await,
                Decision::Cancelled { .. } => recorder.publish("UpgradeCancelled", &message).await,
                _ if new_status.phase == Some(UpgradePhase::Converged)
                    && previous_phase != Some(UpgradePhase::Converged) =>
                {
                    recorder.publish("Converged", &message).await;
                }
                _ => {}
            }

            Ok(match new_status.phase {
                Some(UpgradePhase::Converged) => Action::requeue(DRIFT_INTERVAL),
                _ => Action::requeue(POLL_INTERVAL),
            })
        }
        Err(e) => {
            ctx.metrics.observe_reconcile(&spec.cluster_id, "error", elapsed);
            status::record_error(&mut new_status, &e);
            let _ = status::patch_status(&api, name, &new_status).await;

            if e.is_transient() {
                warn!("Transient error for {}, will retry: {}", name, e);
                return Ok(Action::requeue(TRANSIENT_RETRY));
            }

            let repeated = previous_message.as_deref() == new_status.message.as_deref();
            if let OuoError::UpgradeInProgress { .. } = e {
                info!("Upgrade already in progress for {}: {}", name, e);
                if !repeated {
                    recorder.publish_warning("UpgradeInProgress", &e.to_string()).await;
                }
                return Ok(Action::requeue(POLL_INTERVAL));
            }

            error!("Reconcile error for {}: {}", name, e);
            if !repeated {
                let reason = match e {
                    OuoError::MissingAcknowledgment { .. } => "AcknowledgementRequired",
                    _ => "InvalidDeclaration",
                };
                recorder.publish_warning(reason, &e.to_string()).await;
            }
            Ok(Action::await_change())
        }
    }
}

/// Error policy for the controller.
pub fn error_policy(obj: Arc<OpenShiftUpgrade>, err: &kube::Error, _ctx: Arc<Context>) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    error!("Controller error for {}: {}", name, err);
    Action::requeue(Duration::from_secs(30))
}
