//! OpenShift Cluster Manager (OCM) API access.

pub mod client;
#[cfg(test)]
pub mod fake;
pub mod http;
pub mod types;

pub use client::ClusterManagementClient;
pub use http::OcmClient;
pub use types::{
    ClusterTarget, ClusterTopology, GateAgreement, NewUpgradePolicy, PolicyStateValue,
    UpgradePolicy, VersionGate, VersionQuery,
};
