//! Status patch helpers, condition builders, and event recording.

use anyhow::Result;
use chrono::Utc;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Api;
use kube::Resource;
use kube::api::{Patch, PatchParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::debug;

use crate::crd::{
    OpenShiftUpgrade, OpenShiftUpgradeStatus, ScheduledUpgrade, UpgradeCondition, UpgradePhase,
};
use crate::error::OuoError;
use crate::upgrade::{Decision, NoOpReason};

/// Patch the status subresource of an `OpenShiftUpgrade`.
pub async fn patch_status(
    api: &Api<OpenShiftUpgrade>,
    name: &str,
    status: &OpenShiftUpgradeStatus,
) -> Result<OpenShiftUpgrade> {
    debug!("Patching status for {}: phase={:?}", name, status.phase);

    let patch = serde_json::json!({ "status": status });
    let result = api
        .patch_status(name, &PatchParams::apply("ouo"), &Patch::Merge(&patch))
        .await?;
    Ok(result)
}

/// Set a condition on the status, replacing any condition of the same type.
/// `last_transition_time` only moves when the condition status flips.
pub fn set_condition(
    status: &mut OpenShiftUpgradeStatus,
    condition_type: &str,
    condition_status: &str,
    reason: &str,
    message: Option<String>,
) {
    if let Some(existing) = status
        .conditions
        .iter_mut()
        .find(|c| c.r#type == condition_type)
    {
        if existing.status != condition_status {
            existing.status = condition_status.to_string();
            existing.last_transition_time = Utc::now();
        }
        existing.reason = reason.to_string();
        existing.message = message;
        return;
    }

    status.conditions.push(UpgradeCondition {
        r#type: condition_type.to_string(),
        status: condition_status.to_string(),
        reason: reason.to_string(),
        message,
        last_transition_time: Utc::now(),
    });
}

/// Reflect a successful reconcile decision in the status.
pub fn record_decision(status: &mut OpenShiftUpgradeStatus, decision: &Decision) {
    let message = decision.to_string();
    set_condition(status, "UpgradeInProgress", "False", "NoActiveRollout", None);

    match decision {
        Decision::NoOp {
            reason: NoOpReason::InsufficientInformation,
        } => {
            status.phase = Some(UpgradePhase::Pending);
            set_condition(status, "Ready", "False", "VersionUnknown", Some(message.clone()));
        }
        Decision::NoOp { reason } => {
            status.phase = Some(UpgradePhase::Converged);
            status.scheduled_upgrade = None;
            let condition_reason = match reason {
                NoOpReason::OutOfBandUpgrade => "UpgradedOutOfBand",
                _ => "Converged",
            };
            set_condition(status, "Ready", "True", condition_reason, Some(message.clone()));
        }
        Decision::Cancelled { .. } => {
            status.phase = Some(UpgradePhase::Converged);
            status.scheduled_upgrade = None;
            set_condition(status, "Ready", "True", "UpgradeCancelled", Some(message.clone()));
        }
        Decision::AlreadyScheduled {
            policy_id,
            version,
            next_run,
            ..
        } => {
            status.phase = Some(UpgradePhase::Scheduled);
            status.scheduled_upgrade = Some(ScheduledUpgrade {
                policy_id: policy_id.clone(),
                version: version.clone(),
                next_run: *next_run,
            });
            set_condition(status, "Ready", "False", "UpgradeScheduled", Some(message.clone()));
        }
        Decision::Scheduled {
            policy, agreements, ..
        } => {
            status.phase = Some(UpgradePhase::Scheduled);
            status.scheduled_upgrade = Some(ScheduledUpgrade {
                policy_id: policy.id.clone(),
                version: policy.version.clone(),
                next_run: policy.next_run,
            });
            for agreement in agreements {
                if !status.acknowledged_gates.contains(&agreement.gate_id) {
                    status.acknowledged_gates.push(agreement.gate_id.clone());
                }
            }
            set_condition(status, "Ready", "False", "UpgradeScheduled", Some(message.clone()));
        }
    }

    status.message = Some(message);
}

/// Reflect a reconcile error in the status.
pub fn record_error(status: &mut OpenShiftUpgradeStatus, err: &OuoError) {
    let message = err.to_string();

    match err {
        OuoError::UpgradeInProgress { .. } => {
            status.phase = Some(UpgradePhase::Blocked);
            set_condition(
                status,
                "UpgradeInProgress",
                "True",
                "RolloutInProgress",
                Some(message.clone()),
            );
            set_condition(status, "Ready", "False", "UpgradeInProgress", Some(message.clone()));
        }
        OuoError::MissingAcknowledgment { .. } => {
            status.phase = Some(UpgradePhase::Blocked);
            set_condition(
                status,
                "Ready",
                "False",
                "AcknowledgementRequired",
                Some(message.clone()),
            );
        }
        e if e.needs_new_declaration() => {
            status.phase = Some(UpgradePhase::Failed);
            set_condition(status, "Ready", "False", "InvalidDeclaration", Some(message.clone()));
        }
        _ => {
            set_condition(status, "Ready", "False", "TransientError", Some(message.clone()));
        }
    }

    status.message = Some(message);
}

/// Event recorder bundled with its target `ObjectReference`.
pub struct EventRecorder {
    recorder: Recorder,
    obj_ref: ObjectReference,
}

impl EventRecorder {
    pub fn new(client: kube::Client, obj: &OpenShiftUpgrade) -> Self {
        let reporter = Reporter {
            controller: "ouo".into(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
            obj_ref: obj.object_ref(&()),
        }
    }

    /// Publish a Normal event.
    pub async fn publish(&self, reason: &str, message: &str) {
        self.send(EventType::Normal, reason, message).await;
    }

    /// Publish a Warning event.
    pub async fn publish_warning(&self, reason: &str, message: &str) {
        self.send(EventType::Warning, reason, message).await;
    }

    async fn send(&self, type_: EventType, reason: &str, message: &str) {
        self.recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note: Some(message.into()),
                    action: reason.into(),
                    secondary: None,
                },
                &self.obj_ref,
            )
            .await
            .unwrap_or_else(|e| tracing::warn!("Failed to publish event: {}", e));
    }
}
