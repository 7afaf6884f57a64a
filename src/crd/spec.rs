//! `OpenShiftUpgrade` spec types.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::status::OpenShiftUpgradeStatus;
use crate::ocm::{ClusterTarget, ClusterTopology};
use crate::upgrade::DEFAULT_CHANNEL_GROUP;

/// `OpenShiftUpgrade` spec declares the OpenShift version a managed cluster should run.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "ouo.io",
    version = "v1alpha1",
    kind = "OpenShiftUpgrade",
    shortname = "osup",
    status = "OpenShiftUpgradeStatus",
    printcolumn = r#"{"name":"CLUSTER","type":"string","jsonPath":".spec.clusterId"}"#,
    printcolumn = r#"{"name":"DESIRED","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"CURRENT","type":"string","jsonPath":".status.currentVersion"}"#,
    printcolumn = r#"{"name":"PHASE","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftUpgradeSpec {
    /// OCM cluster ID (not the display name).
    pub cluster_id: String,

    /// Control plane topology: `Classic` or `Hcp`.
    #[serde(default)]
    pub topology: ClusterTopology,

    /// Desired OpenShift version without the "openshift-v" prefix (e.g., "4.14.1").
    /// Leave unset to only observe the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Channel group the version is listed under.
    #[serde(default = "default_channel_group")]
    pub channel_group: String,

    /// Minor version (e.g., "4.14") whose version gates the user acknowledges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_acknowledgements_for: Option<String>,
}

fn default_channel_group() -> String {
    DEFAULT_CHANNEL_GROUP.to_string()
}

impl OpenShiftUpgradeSpec {
    pub fn target(&self) -> ClusterTarget {
        ClusterTarget::new(self.cluster_id.clone(), self.topology)
    }
}
