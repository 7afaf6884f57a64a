//! Wire models for the OCM `clusters_mgmt/v1` API.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Control plane topology of a managed cluster.
///
/// Decides which upgrade policy collection applies to the cluster and which
/// upgrade type those policies carry.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum ClusterTopology {
    /// ROSA classic: policies live under `/upgrade_policies` with type `OSD`.
    Classic,
    /// Hosted control plane: policies live under `/control_plane/upgrade_policies`.
    #[default]
    Hcp,
}

impl ClusterTopology {
    /// Upgrade type carried by the policies this engine manages.
    pub const fn upgrade_type(self) -> &'static str {
        match self {
            Self::Classic => "OSD",
            Self::Hcp => "ControlPlane",
        }
    }

    /// Path segment of the policy collection below `/clusters/{id}`.
    pub const fn policies_path(self) -> &'static str {
        match self {
            Self::Classic => "upgrade_policies",
            Self::Hcp => "control_plane/upgrade_policies",
        }
    }
}

impl std::fmt::Display for ClusterTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classic => write!(f, "Classic"),
            Self::Hcp => write!(f, "Hcp"),
        }
    }
}

/// A managed cluster addressed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTarget {
    pub id: String,
    pub topology: ClusterTopology,
}

impl ClusterTarget {
    pub fn new(id: impl Into<String>, topology: ClusterTopology) -> Self {
        Self {
            id: id.into(),
            topology,
        }
    }
}

impl std::fmt::Display for ClusterTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.topology)
    }
}

/// One page of an OCM list response.
#[derive(Deserialize, Debug, Clone)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Search parameters for listing versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionQuery {
    pub search: String,
    pub order: String,
    pub page: u32,
    pub size: u32,
}

/// An OpenShift version as listed by the version catalog.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Version {
    /// Remote identifier, e.g. `openshift-v4.14.1-candidate`.
    #[serde(default)]
    pub id: String,
    /// Bare version, e.g. `4.14.1`.
    #[serde(default)]
    pub raw_id: String,
    #[serde(default)]
    pub channel_group: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rosa_enabled: bool,
    #[serde(default)]
    pub hosted_control_plane_enabled: bool,
    /// Raw ids of the versions reachable from this one.
    #[serde(default)]
    pub available_upgrades: Vec<String>,
}

impl Version {
    /// Whether the version may be installed on a cluster of the given topology.
    pub const fn installable_on(&self, topology: ClusterTopology) -> bool {
        let hcp_ok = match topology {
            ClusterTopology::Classic => true,
            ClusterTopology::Hcp => self.hosted_control_plane_enabled,
        };
        self.rosa_enabled && hcp_ok
    }
}

/// Version section of a cluster record.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ClusterVersion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub raw_id: String,
    #[serde(default)]
    pub channel_group: String,
}

/// The parts of a cluster record the operator reads.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Cluster {
    #[serde(default)]
    pub version: Option<ClusterVersion>,
}

/// Value of an upgrade policy state.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStateValue {
    Pending,
    Scheduled,
    Delayed,
    Started,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl PolicyStateValue {
    /// Waiting for its start time; may still be cancelled.
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::Pending | Self::Scheduled)
    }

    /// Rollout has begun (or was postponed mid-flight) and must not be interrupted.
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Delayed | Self::Started)
    }

    pub const fn is_live(self) -> bool {
        self.is_queued() || self.is_in_progress()
    }
}

impl std::fmt::Display for PolicyStateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Delayed => "delayed",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// State of an upgrade policy.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UpgradePolicyState {
    #[serde(default)]
    pub description: String,
    pub value: PolicyStateValue,
}

impl UpgradePolicyState {
    pub fn new(value: PolicyStateValue) -> Self {
        Self {
            description: String::new(),
            value,
        }
    }
}

/// An upgrade policy owned by the remote service.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UpgradePolicy {
    pub id: String,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub schedule_type: String,
    #[serde(default)]
    pub upgrade_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub next_run: Option<DateTime<Utc>>,
    /// Inline state, only reported for control plane policies.
    #[serde(default, skip_serializing)]
    pub state: Option<UpgradePolicyState>,
}

/// Request body for creating an upgrade policy.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NewUpgradePolicy {
    pub schedule_type: String,
    pub upgrade_type: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
}

impl NewUpgradePolicy {
    pub const SCHEDULE_MANUAL: &'static str = "manual";

    /// A manual-schedule policy for the given topology.
    pub fn manual(
        topology: ClusterTopology,
        version: impl Into<String>,
        next_run: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            schedule_type: Self::SCHEDULE_MANUAL.to_string(),
            upgrade_type: topology.upgrade_type().to_string(),
            version: version.into(),
            next_run,
        }
    }
}

/// A checkpoint that must be agreed to before crossing a version boundary.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionGate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version_raw_id_prefix: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub documentation_url: String,
    #[serde(default)]
    pub warning_message: String,
    /// Only relevant to STS clusters; agreed without user acknowledgment.
    #[serde(default)]
    pub sts_only: bool,
}

/// Record of a version gate agreed for a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateAgreement {
    pub id: String,
    pub gate_id: String,
    pub cluster_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// OCM error body.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
