//! Per-reconcile upgrade decision.
//!
//! One call to [`UpgradeDecisionEngine::reconcile_version`] classifies the
//! version change, aligns existing upgrade policies with it, resolves version
//! gates and schedules at most one new policy. Every path is safe to repeat
//! with the same inputs: agreed gates stop blocking and an equivalent live
//! policy short-circuits the call.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::error::OuoError;
use crate::ocm::{ClusterManagementClient, ClusterTarget, GateAgreement, UpgradePolicy};

use super::catalog::VersionCatalog;
use super::comparator::{self, Classification};
use super::gates::GateAgreementResolver;
use super::scheduler::{DEFAULT_START_DELAY, RemovalBackoff, UpgradePolicyScheduler};

/// Version inputs for one reconcile. Absent values are unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterVersionState {
    /// Version the cluster currently runs, as read from the cluster record.
    pub current_version: Option<String>,
    /// Remote id of the version the cluster runs (`openshift-v4.14.0`), when
    /// the cluster record carries one. Upgrade targets are read from it.
    pub current_version_id: Option<String>,
    /// Version the user declares now.
    pub desired_version: Option<String>,
    pub channel_group: String,
    /// Version the user declared on the previous successful reconcile.
    pub previously_requested_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    InsufficientInformation,
    AlreadyAtVersion,
    /// The cluster moved past an unchanged declaration on its own.
    OutOfBandUpgrade,
}

impl std::fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientInformation => write!(f, "current or desired version unknown"),
            Self::AlreadyAtVersion => write!(f, "cluster already runs the desired version"),
            Self::OutOfBandUpgrade => {
                write!(f, "cluster was upgraded past the declared version")
            }
        }
    }
}

/// What a reconcile did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NoOp {
        reason: NoOpReason,
    },
    /// Queued upgrades to unwanted versions were cancelled; nothing scheduled.
    Cancelled {
        policy_ids: Vec<String>,
    },
    /// A live policy already targets the desired version.
    AlreadyScheduled {
        policy_id: String,
        version: String,
        next_run: Option<DateTime<Utc>>,
        cancelled: Vec<String>,
    },
    Scheduled {
        policy: UpgradePolicy,
        agreements: Vec<GateAgreement>,
        cancelled: Vec<String>,
    },
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOp { reason } => write!(f, "No action: {reason}"),
            Self::Cancelled { policy_ids } => {
                write!(f, "Cancelled upgrade policies: {}", policy_ids.join(", "))
            }
            Self::AlreadyScheduled {
                policy_id, version, ..
            } => write!(f, "Upgrade to {version} already scheduled ({policy_id})"),
            Self::Scheduled {
                policy, agreements, ..
            } => {
                write!(f, "Scheduled upgrade to {} ({})", policy.version, policy.id)?;
                if !agreements.is_empty() {
                    write!(f, " after agreeing to {} version gate(s)", agreements.len())?;
                }
                Ok(())
            }
        }
    }
}

/// Tunables shared by every reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub start_delay: TimeDelta,
    pub removal_backoff: RemovalBackoff,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            start_delay: DEFAULT_START_DELAY,
            removal_backoff: RemovalBackoff::default(),
        }
    }
}

pub struct UpgradeDecisionEngine<'a, C: ClusterManagementClient + ?Sized> {
    client: &'a C,
    settings: EngineSettings,
}

fn known(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl<'a, C: ClusterManagementClient + ?Sized> UpgradeDecisionEngine<'a, C> {
    pub const fn new(client: &'a C, settings: EngineSettings) -> Self {
        Self { client, settings }
    }

    fn scheduler(&self) -> UpgradePolicyScheduler<'a, C> {
        UpgradePolicyScheduler::new(
            self.client,
            self.settings.start_delay,
            self.settings.removal_backoff,
        )
    }

    /// Drive the cluster one step towards the desired version.
    pub async fn reconcile_version(
        &self,
        cluster: &ClusterTarget,
        state: &ClusterVersionState,
        ack: Option<&str>,
    ) -> Result<Decision, OuoError> {
        let (Some(current), Some(desired)) = (
            known(state.current_version.as_ref()),
            known(state.desired_version.as_ref()),
        ) else {
            debug!("Skipping {}: current or desired version unknown", cluster);
            return Ok(Decision::NoOp {
                reason: NoOpReason::InsufficientInformation,
            });
        };

        let (classification, current, desired) = comparator::compare(
            current,
            desired,
            known(state.previously_requested_version.as_ref()),
        )?;
        info!(
            "Cluster {} at {} wants {}: {}",
            cluster, current, desired, classification
        );

        let scheduler = self.scheduler();
        match classification {
            Classification::NoOp => Ok(Decision::NoOp {
                reason: NoOpReason::OutOfBandUpgrade,
            }),
            Classification::Downgrade => Err(OuoError::DowngradeNotSupported {
                current: current.to_string(),
                desired: desired.to_string(),
            }),
            Classification::CancelOnly => {
                let outcome = scheduler.reconcile_pending(cluster, &desired).await?;
                if outcome.cancelled.is_empty() {
                    Ok(Decision::NoOp {
                        reason: NoOpReason::AlreadyAtVersion,
                    })
                } else {
                    Ok(Decision::Cancelled {
                        policy_ids: outcome.cancelled,
                    })
                }
            }
            Classification::Upgrade => {
                VersionCatalog::new(self.client, cluster.topology)
                    .validate_upgrade(
                        &state.channel_group,
                        &current,
                        known(state.current_version_id.as_ref()),
                        &desired,
                    )
                    .await?;

                let outcome = scheduler.reconcile_pending(cluster, &desired).await?;
                if let Some(live) = outcome.equivalent {
                    info!(
                        "Upgrade of {} to {} already {} as {}",
                        cluster, desired, live.state, live.policy.id
                    );
                    return Ok(Decision::AlreadyScheduled {
                        policy_id: live.policy.id,
                        version: live.version.to_string(),
                        next_run: live.policy.next_run,
                        cancelled: outcome.cancelled,
                    });
                }

                let request = scheduler.request(cluster.topology, &desired);
                let agreements = GateAgreementResolver::new(self.client)
                    .resolve(cluster, &request, &desired, ack)
                    .await?;
                let policy = scheduler.schedule(cluster, &desired).await?;

                Ok(Decision::Scheduled {
                    policy,
                    agreements,
                    cancelled: outcome.cancelled,
                })
            }
        }
    }
}
