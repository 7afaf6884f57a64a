//! `OpenShiftUpgrade` status types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::UpgradePhase;

/// Condition on the `OpenShiftUpgrade` resource.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeCondition {
    pub r#type: String,
    pub status: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition_time: DateTime<Utc>,
}

/// The upgrade policy currently targeting the desired version.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledUpgrade {
    pub policy_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
}

/// `OpenShiftUpgradeStatus` defines the observed state of the cluster version.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftUpgradeStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<UpgradePhase>,

    /// OpenShift version the cluster reported on the last reconcile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,

    /// `spec.version` as of the last successful reconcile.
    /// Lets an unchanged declaration tolerate an out-of-band upgrade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_requested_version: Option<String>,

    /// Policy scheduled for the desired version.
    /// NOTE: No `skip_serializing_if`. None must serialize as `null` so that
    /// JSON Merge Patch (RFC 7396) removes a stale policy from the status.
    #[serde(default)]
    pub scheduled_upgrade: Option<ScheduledUpgrade>,

    /// Version gate ids agreed on behalf of the cluster.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acknowledged_gates: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<UpgradeCondition>,

    /// Last observed generation of the spec.
    #[serde(default)]
    pub observed_generation: i64,

    /// Outcome of the last reconcile, or the error that stopped it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled_at: Option<DateTime<Utc>>,
}
