//! The cluster management collaborator consumed by the upgrade engine.

use async_trait::async_trait;

use super::types::{
    Cluster, ClusterTarget, GateAgreement, NewUpgradePolicy, Page, UpgradePolicy,
    UpgradePolicyState, Version, VersionQuery,
};
use crate::error::OcmError;

/// Request/response access to the remote cluster management service.
///
/// Every call is a single round trip. Implementations must not retry.
#[async_trait]
pub trait ClusterManagementClient: Send + Sync {
    /// List one page of the version catalog.
    async fn list_versions(&self, query: &VersionQuery) -> Result<Page<Version>, OcmError>;

    /// Fetch a single version by its remote id (`openshift-v...`).
    async fn get_version(&self, version_id: &str) -> Result<Version, OcmError>;

    /// Fetch a cluster record.
    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster, OcmError>;

    /// List one page of the cluster's upgrade policies.
    async fn list_upgrade_policies(
        &self,
        cluster: &ClusterTarget,
        page: u32,
        size: u32,
    ) -> Result<Page<UpgradePolicy>, OcmError>;

    /// Read the state of one upgrade policy.
    async fn get_upgrade_policy_state(
        &self,
        cluster: &ClusterTarget,
        policy_id: &str,
    ) -> Result<UpgradePolicyState, OcmError>;

    /// Create an upgrade policy, or validate it without creating when `dry_run` is set.
    ///
    /// Returns `None` when the service accepts the request without a body
    /// (dry runs). Missing gate agreements are reported as
    /// [`OcmError::GateAgreementsRequired`].
    async fn create_upgrade_policy(
        &self,
        cluster: &ClusterTarget,
        policy: &NewUpgradePolicy,
        dry_run: bool,
    ) -> Result<Option<UpgradePolicy>, OcmError>;

    async fn delete_upgrade_policy(
        &self,
        cluster: &ClusterTarget,
        policy_id: &str,
    ) -> Result<(), OcmError>;

    /// Agree to a version gate on behalf of the cluster.
    async fn create_gate_agreement(
        &self,
        cluster: &ClusterTarget,
        gate_id: &str,
    ) -> Result<GateAgreement, OcmError>;
}
