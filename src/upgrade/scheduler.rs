//! Upgrade policy inspection, cancellation and scheduling.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::error::{OcmError, OuoError};
use crate::ocm::{
    ClusterManagementClient, ClusterTarget, ClusterTopology, NewUpgradePolicy, PolicyStateValue,
    UpgradePolicy,
};

use super::version::VersionId;

/// Page size used when listing policies.
pub const PAGE_SIZE: u32 = 100;

/// Time between scheduling a policy and the rollout starting.
pub const DEFAULT_START_DELAY: TimeDelta = TimeDelta::minutes(10);

/// Polling schedule used while waiting for a deleted policy to disappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalBackoff {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RemovalBackoff {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RemovalBackoff {
    /// Same attempt count, no sleeping.
    #[cfg(test)]
    pub const fn none() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::ZERO,
        }
    }
}

/// A queued or in-progress policy of the relevant upgrade type.
#[derive(Debug, Clone)]
pub struct LivePolicy {
    pub policy: UpgradePolicy,
    pub state: PolicyStateValue,
    pub version: VersionId,
}

/// Result of aligning existing policies with the desired version.
#[derive(Debug, Clone, Default)]
pub struct PendingOutcome {
    /// A live policy already targeting the desired version.
    pub equivalent: Option<LivePolicy>,
    /// Ids of queued policies that were cancelled.
    pub cancelled: Vec<String>,
}

fn lookup_err(cluster: &ClusterTarget) -> impl Fn(OcmError) -> OuoError + '_ {
    move |source| OuoError::PolicyLookup {
        cluster_id: cluster.id.clone(),
        source,
    }
}

pub struct UpgradePolicyScheduler<'a, C: ClusterManagementClient + ?Sized> {
    client: &'a C,
    start_delay: TimeDelta,
    backoff: RemovalBackoff,
}

impl<'a, C: ClusterManagementClient + ?Sized> UpgradePolicyScheduler<'a, C> {
    pub const fn new(client: &'a C, start_delay: TimeDelta, backoff: RemovalBackoff) -> Self {
        Self {
            client,
            start_delay,
            backoff,
        }
    }

    /// Queued and in-progress policies of the cluster's upgrade type.
    pub async fn list_live(&self, cluster: &ClusterTarget) -> Result<Vec<LivePolicy>, OuoError> {
        let upgrade_type = cluster.topology.upgrade_type();
        let mut policies = Vec::new();
        let mut page = 1;
        loop {
            let result = self
                .client
                .list_upgrade_policies(cluster, page, PAGE_SIZE)
                .await
                .map_err(lookup_err(cluster))?;
            let count = result.items.len();
            policies.extend(
                result
                    .items
                    .into_iter()
                    .filter(|p| p.upgrade_type == upgrade_type),
            );
            if count < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }

        let mut live = Vec::new();
        for policy in policies {
            let state = match policy.state.as_ref() {
                Some(inline) => inline.value,
                None => match self.client.get_upgrade_policy_state(cluster, &policy.id).await {
                    Ok(state) => state.value,
                    Err(e) if e.is_not_found() => {
                        debug!("Policy {} on {} disappeared while listing", policy.id, cluster);
                        continue;
                    }
                    Err(e) => return Err(lookup_err(cluster)(e)),
                },
            };
            if !state.is_live() {
                continue;
            }
            let version = VersionId::parse(&policy.version)?;
            live.push(LivePolicy {
                policy,
                state,
                version,
            });
        }
        Ok(live)
    }

    /// Align existing policies with `desired`.
    ///
    /// An in-progress policy for any other version is refused before anything
    /// is deleted. Queued policies for other versions are cancelled.
    pub async fn reconcile_pending(
        &self,
        cluster: &ClusterTarget,
        desired: &VersionId,
    ) -> Result<PendingOutcome, OuoError> {
        let live = self.list_live(cluster).await?;
        let wanted = |p: &LivePolicy| p.version == *desired;

        if let Some(active) = live
            .iter()
            .find(|p| p.state.is_in_progress() && !wanted(*p))
        {
            return Err(OuoError::UpgradeInProgress {
                cluster_id: cluster.id.clone(),
                version: active.version.to_string(),
            });
        }

        let mut outcome = PendingOutcome::default();
        for policy in live {
            if wanted(&policy) {
                if outcome.equivalent.is_none() {
                    outcome.equivalent = Some(policy);
                }
                continue;
            }
            info!(
                "Cancelling {} upgrade policy {} to {} on {}",
                policy.state, policy.policy.id, policy.version, cluster
            );
            self.cancel(cluster, &policy.policy.id).await?;
            outcome.cancelled.push(policy.policy.id);
        }
        Ok(outcome)
    }

    /// Manual policy request starting after the configured delay.
    pub fn request(&self, topology: ClusterTopology, desired: &VersionId) -> NewUpgradePolicy {
        NewUpgradePolicy::manual(
            topology,
            desired.to_string(),
            Some(Utc::now() + self.start_delay),
        )
    }

    pub async fn schedule(
        &self,
        cluster: &ClusterTarget,
        desired: &VersionId,
    ) -> Result<UpgradePolicy, OuoError> {
        let request = self.request(cluster.topology, desired);
        let scheduling_err = |source| OuoError::Scheduling {
            version: desired.to_string(),
            source,
        };
        let policy = self
            .client
            .create_upgrade_policy(cluster, &request, false)
            .await
            .map_err(scheduling_err)?
            .ok_or_else(|| {
                scheduling_err(OcmError::Decode(
                    "upgrade_policies::create".to_string(),
                    "empty response".to_string(),
                ))
            })?;
        info!(
            "Scheduled upgrade policy {} for {} to {} at {:?}",
            policy.id, cluster, desired, policy.next_run
        );
        Ok(policy)
    }

    /// Delete a policy and wait for it to go away. An already-deleted policy is fine.
    pub async fn cancel(&self, cluster: &ClusterTarget, policy_id: &str) -> Result<(), OuoError> {
        match self.client.delete_upgrade_policy(cluster, policy_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("Policy {} on {} already gone", policy_id, cluster);
                return Ok(());
            }
            Err(e) => return Err(lookup_err(cluster)(e)),
        }
        self.await_removal(cluster, policy_id).await
    }

    async fn await_removal(&self, cluster: &ClusterTarget, policy_id: &str) -> Result<(), OuoError> {
        let mut delay = self.backoff.initial_delay;
        let mut waited = Duration::ZERO;

        for attempt in 1..=self.backoff.attempts {
            match self.client.get_upgrade_policy_state(cluster, policy_id).await {
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(lookup_err(cluster)(e)),
                Ok(state) if !state.value.is_live() => return Ok(()),
                Ok(state) => debug!(
                    "Policy {} on {} still {} (attempt {}/{})",
                    policy_id, cluster, state.value, attempt, self.backoff.attempts
                ),
            }
            if attempt == self.backoff.attempts {
                break;
            }
            tokio::time::sleep(delay).await;
            waited += delay;
            delay *= 2;
        }

        warn!(
            "Policy {} on {} still present after {:?}",
            policy_id, cluster, waited
        );
        Err(OuoError::PolicyRemovalTimeout {
            cluster_id: cluster.id.clone(),
            policy_id: policy_id.to_string(),
            waited_secs: waited.as_secs(),
        })
    }
}
