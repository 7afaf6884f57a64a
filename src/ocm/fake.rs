//! In-memory cluster management service for tests.
//!
//! Mirrors the OCM behaviors the engine depends on: gates already agreed for a
//! cluster stop appearing in dry-run rejections, real policy creation is also
//! rejected while gates are unagreed, and deleted policies read back as 404.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::client::ClusterManagementClient;
use super::types::{
    Cluster, ClusterTarget, ClusterVersion, GateAgreement, NewUpgradePolicy, Page,
    PolicyStateValue, UpgradePolicy, UpgradePolicyState, Version, VersionGate, VersionQuery,
};
use crate::error::OcmError;

/// A remote call observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListVersions { page: u32 },
    GetVersion(String),
    GetCluster(String),
    ListPolicies { page: u32 },
    GetPolicyState(String),
    CreatePolicy { version: String, dry_run: bool },
    DeletePolicy(String),
    CreateAgreement(String),
}

impl Call {
    /// Calls that change remote state.
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreatePolicy { dry_run: false, .. }
                | Self::DeletePolicy(_)
                | Self::CreateAgreement(_)
        )
    }
}

#[derive(Default)]
struct State {
    versions: Vec<Version>,
    clusters: HashMap<String, Cluster>,
    policies: Vec<(UpgradePolicy, PolicyStateValue)>,
    gates: Vec<VersionGate>,
    agreements: Vec<GateAgreement>,
    calls: Vec<Call>,
    failing_gate: Option<String>,
    stalled_gate: Option<(String, Duration)>,
    fail_versions: bool,
    fail_create: bool,
    sticky_deletes: bool,
    next_id: u32,
}

#[derive(Default)]
pub struct FakeOcm {
    state: Mutex<State>,
}

impl FakeOcm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a catalog version. `available_upgrades` are raw ids.
    pub fn with_version(self, raw_id: &str, channel_group: &str, available_upgrades: &[&str]) -> Self {
        let id = crate::upgrade::version::remote_version_id(raw_id, channel_group);
        self.with_version_record(Version {
            id,
            raw_id: raw_id.to_string(),
            channel_group: channel_group.to_string(),
            enabled: true,
            rosa_enabled: true,
            hosted_control_plane_enabled: true,
            available_upgrades: available_upgrades.iter().map(ToString::to_string).collect(),
        })
    }

    pub fn with_version_record(self, version: Version) -> Self {
        self.state.lock().unwrap().versions.push(version);
        self
    }

    pub fn with_cluster(self, id: &str, raw_version: &str, channel_group: &str) -> Self {
        self.state.lock().unwrap().clusters.insert(
            id.to_string(),
            Cluster {
                version: Some(ClusterVersion {
                    id: crate::upgrade::version::remote_version_id(raw_version, channel_group),
                    raw_id: raw_version.to_string(),
                    channel_group: channel_group.to_string(),
                }),
            },
        );
        self
    }

    pub fn with_policy(
        self,
        cluster: &ClusterTarget,
        id: &str,
        version: &str,
        state: PolicyStateValue,
    ) -> Self {
        self.with_policy_of_type(cluster, id, version, cluster.topology.upgrade_type(), state)
    }

    pub fn with_policy_of_type(
        self,
        cluster: &ClusterTarget,
        id: &str,
        version: &str,
        upgrade_type: &str,
        state: PolicyStateValue,
    ) -> Self {
        self.state.lock().unwrap().policies.push((
            UpgradePolicy {
                id: id.to_string(),
                cluster_id: cluster.id.clone(),
                schedule_type: "manual".to_string(),
                upgrade_type: upgrade_type.to_string(),
                version: version.to_string(),
                next_run: Some(Utc::now()),
                state: None,
            },
            state,
        ));
        self
    }

    /// Add a gate that blocks upgrades to versions starting with `prefix`.
    pub fn with_gate(self, id: &str, prefix: &str, sts_only: bool) -> Self {
        self.state.lock().unwrap().gates.push(VersionGate {
            id: id.to_string(),
            version_raw_id_prefix: prefix.to_string(),
            label: format!("api.openshift.com/{id}"),
            description: format!("Gate {id} for {prefix}"),
            documentation_url: format!("https://docs.example.com/{id}"),
            warning_message: String::new(),
            sts_only,
        });
        self
    }

    /// Make agreements for the given gate fail with a server error.
    pub fn failing_gate(self, gate_id: &str) -> Self {
        self.state.lock().unwrap().failing_gate = Some(gate_id.to_string());
        self
    }

    /// Hold agreements for the given gate for `delay` before answering.
    pub fn stalling_gate(self, gate_id: &str, delay: Duration) -> Self {
        self.state.lock().unwrap().stalled_gate = Some((gate_id.to_string(), delay));
        self
    }

    /// Answer stalled agreements immediately from now on.
    pub fn release_stall(&self) {
        self.state.lock().unwrap().stalled_gate = None;
    }

    pub fn failing_versions(self) -> Self {
        self.state.lock().unwrap().fail_versions = true;
        self
    }

    /// Make real (non dry-run) policy creation fail with a server error.
    pub fn failing_create(self) -> Self {
        self.state.lock().unwrap().fail_create = true;
        self
    }

    /// Deleted policies keep reporting a live state.
    pub fn sticky_deletes(self) -> Self {
        self.state.lock().unwrap().sticky_deletes = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn policies(&self) -> Vec<UpgradePolicy> {
        self.state
            .lock()
            .unwrap()
            .policies
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn agreements(&self) -> Vec<GateAgreement> {
        self.state.lock().unwrap().agreements.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn unagreed_gates(state: &State, cluster_id: &str, version: &str) -> Vec<VersionGate> {
        state
            .gates
            .iter()
            .filter(|g| version.starts_with(&g.version_raw_id_prefix))
            .filter(|g| {
                !state
                    .agreements
                    .iter()
                    .any(|a| a.cluster_id == cluster_id && a.gate_id == g.id)
            })
            .cloned()
            .collect()
    }
}

fn server_error(operation: &str) -> OcmError {
    OcmError::Api {
        operation: operation.to_string(),
        status: 500,
        code: "CLUSTERS-MGMT-500".to_string(),
        reason: "internal error".to_string(),
    }
}

fn paginate<T: Clone>(items: &[T], page: u32, size: u32) -> Page<T> {
    let start = ((page.max(1) - 1) * size) as usize;
    let items: Vec<T> = items.iter().skip(start).take(size as usize).cloned().collect();
    Page { items }
}

#[async_trait]
impl ClusterManagementClient for FakeOcm {
    async fn list_versions(&self, query: &VersionQuery) -> Result<Page<Version>, OcmError> {
        self.record(Call::ListVersions { page: query.page });
        let state = self.state.lock().unwrap();
        if state.fail_versions {
            return Err(server_error("versions::list"));
        }
        let matching: Vec<Version> = state
            .versions
            .iter()
            .filter(|v| v.enabled && v.rosa_enabled)
            .filter(|v| {
                query
                    .search
                    .contains(&format!("channel_group = '{}'", v.channel_group))
            })
            .cloned()
            .collect();
        Ok(paginate(&matching, query.page, query.size))
    }

    async fn get_version(&self, version_id: &str) -> Result<Version, OcmError> {
        self.record(Call::GetVersion(version_id.to_string()));
        let state = self.state.lock().unwrap();
        if state.fail_versions {
            return Err(server_error("versions::get"));
        }
        state
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .cloned()
            .ok_or_else(|| OcmError::NotFound("versions::get".to_string()))
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster, OcmError> {
        self.record(Call::GetCluster(cluster_id.to_string()));
        self.state
            .lock()
            .unwrap()
            .clusters
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| OcmError::NotFound("clusters::get".to_string()))
    }

    async fn list_upgrade_policies(
        &self,
        cluster: &ClusterTarget,
        page: u32,
        size: u32,
    ) -> Result<Page<UpgradePolicy>, OcmError> {
        self.record(Call::ListPolicies { page });
        let state = self.state.lock().unwrap();
        let policies: Vec<UpgradePolicy> = state
            .policies
            .iter()
            .filter(|(p, _)| p.cluster_id == cluster.id)
            .map(|(p, _)| p.clone())
            .collect();
        Ok(paginate(&policies, page, size))
    }

    async fn get_upgrade_policy_state(
        &self,
        cluster: &ClusterTarget,
        policy_id: &str,
    ) -> Result<UpgradePolicyState, OcmError> {
        self.record(Call::GetPolicyState(policy_id.to_string()));
        self.state
            .lock()
            .unwrap()
            .policies
            .iter()
            .find(|(p, _)| p.id == policy_id && p.cluster_id == cluster.id)
            .map(|(_, s)| UpgradePolicyState::new(*s))
            .ok_or_else(|| OcmError::NotFound("upgrade_policies::state".to_string()))
    }

    async fn create_upgrade_policy(
        &self,
        cluster: &ClusterTarget,
        policy: &NewUpgradePolicy,
        dry_run: bool,
    ) -> Result<Option<UpgradePolicy>, OcmError> {
        self.record(Call::CreatePolicy {
            version: policy.version.clone(),
            dry_run,
        });
        let mut state = self.state.lock().unwrap();
        let operation = "upgrade_policies::create";

        let missing = Self::unagreed_gates(&state, &cluster.id, &policy.version);
        if !missing.is_empty() {
            return Err(OcmError::GateAgreementsRequired {
                operation: operation.to_string(),
                gates: missing,
            });
        }
        if dry_run {
            return Ok(None);
        }
        if state.fail_create {
            return Err(server_error(operation));
        }

        state.next_id += 1;
        let created = UpgradePolicy {
            id: format!("policy-{}", state.next_id),
            cluster_id: cluster.id.clone(),
            schedule_type: policy.schedule_type.clone(),
            upgrade_type: policy.upgrade_type.clone(),
            version: policy.version.clone(),
            next_run: policy.next_run,
            state: None,
        };
        state
            .policies
            .push((created.clone(), PolicyStateValue::Scheduled));
        Ok(Some(created))
    }

    async fn delete_upgrade_policy(
        &self,
        cluster: &ClusterTarget,
        policy_id: &str,
    ) -> Result<(), OcmError> {
        self.record(Call::DeletePolicy(policy_id.to_string()));
        let mut state = self.state.lock().unwrap();
        let before = state.policies.len();
        if state.sticky_deletes {
            return if state.policies.iter().any(|(p, _)| p.id == policy_id) {
                Ok(())
            } else {
                Err(OcmError::NotFound("upgrade_policies::delete".to_string()))
            };
        }
        state
            .policies
            .retain(|(p, _)| !(p.id == policy_id && p.cluster_id == cluster.id));
        if state.policies.len() == before {
            return Err(OcmError::NotFound("upgrade_policies::delete".to_string()));
        }
        Ok(())
    }

    async fn create_gate_agreement(
        &self,
        cluster: &ClusterTarget,
        gate_id: &str,
    ) -> Result<GateAgreement, OcmError> {
        self.record(Call::CreateAgreement(gate_id.to_string()));
        let stall = self
            .state
            .lock()
            .unwrap()
            .stalled_gate
            .as_ref()
            .filter(|(id, _)| id == gate_id)
            .map(|(_, delay)| *delay);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if state.failing_gate.as_deref() == Some(gate_id) {
            return Err(server_error("gate_agreements::create"));
        }
        state.next_id += 1;
        let agreement = GateAgreement {
            id: format!("agreement-{}", state.next_id),
            gate_id: gate_id.to_string(),
            cluster_id: cluster.id.clone(),
            created_at: Some(Utc::now()),
        };
        state.agreements.push(agreement.clone());
        Ok(agreement)
    }
}
