//! Version gate discovery and acknowledgment.
//!
//! Gates are discovered by a dry-run policy creation. Gates that are not
//! STS-only need the user to declare the target minor version as acknowledged
//! before any agreement is created; once that check passes every blocking gate
//! is agreed.

use std::fmt::Write;

use tracing::{debug, info};

use crate::error::{OcmError, OuoError};
use crate::ocm::{ClusterManagementClient, ClusterTarget, GateAgreement, NewUpgradePolicy, VersionGate};

use super::version::VersionId;

/// Split gates into (STS-only, acknowledgment-required).
pub fn partition_gates(gates: &[VersionGate]) -> (Vec<&VersionGate>, Vec<&VersionGate>) {
    gates.iter().partition(|g| g.sts_only)
}

/// Human readable list of the gates a user has to acknowledge.
pub fn describe_gates(gates: &[VersionGate]) -> String {
    let mut out = String::from(
        "Missing required acknowledgements to schedule upgrade.\n\
         Read the below description and acknowledge to proceed with upgrade.\n\
         Description:",
    );
    let (_, ack_required) = partition_gates(gates);
    for (n, gate) in ack_required.iter().enumerate() {
        let _ = write!(out, "\n{}) {}\n", n + 1, gate.description);
        if !gate.warning_message.is_empty() {
            let _ = writeln!(out, "   Warning:     {}", gate.warning_message);
        }
        let _ = write!(out, "   URL:         {}", gate.documentation_url);
    }
    out
}

/// Fails unless `ack` equals the desired `major.minor` whenever a gate needs it.
///
/// Pure: no remote calls, so a failure leaves nothing behind.
pub fn check_acknowledgment(
    gates: &[VersionGate],
    desired: &VersionId,
    ack: Option<&str>,
) -> Result<(), OuoError> {
    let (_, ack_required) = partition_gates(gates);
    if ack_required.is_empty() {
        return Ok(());
    }
    let required_minor = desired.minor_string();
    if ack == Some(required_minor.as_str()) {
        return Ok(());
    }
    Err(OuoError::MissingAcknowledgment {
        required_minor,
        provided_ack: ack.map(ToString::to_string),
        gate_descriptions: describe_gates(gates),
    })
}

pub struct GateAgreementResolver<'a, C: ClusterManagementClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ClusterManagementClient + ?Sized> GateAgreementResolver<'a, C> {
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Dry-run the policy and return the gates blocking it.
    pub async fn discover(
        &self,
        cluster: &ClusterTarget,
        request: &NewUpgradePolicy,
    ) -> Result<Vec<VersionGate>, OuoError> {
        match self.client.create_upgrade_policy(cluster, request, true).await {
            Ok(_) => {
                debug!("Dry run for {} on {} found no blocking gates", request.version, cluster);
                Ok(Vec::new())
            }
            Err(OcmError::GateAgreementsRequired { gates, .. }) => {
                info!(
                    "Upgrade of {} to {} is blocked by {} version gate(s)",
                    cluster,
                    request.version,
                    gates.len()
                );
                Ok(gates)
            }
            Err(source) => Err(OuoError::Scheduling {
                version: request.version.clone(),
                source,
            }),
        }
    }

    /// Agree to every gate, stopping at the first failure.
    pub async fn acknowledge(
        &self,
        cluster: &ClusterTarget,
        gates: &[VersionGate],
    ) -> Result<Vec<GateAgreement>, OuoError> {
        let mut agreements = Vec::with_capacity(gates.len());
        for gate in gates {
            let agreement = self
                .client
                .create_gate_agreement(cluster, &gate.id)
                .await
                .map_err(|source| OuoError::GateAcknowledgment {
                    gate_id: gate.id.clone(),
                    cluster_id: cluster.id.clone(),
                    source,
                })?;
            info!("Agreed to version gate {} ({}) for {}", gate.id, gate.label, cluster);
            agreements.push(agreement);
        }
        Ok(agreements)
    }

    /// Discover, check the acknowledgment, then agree. Returns the agreements created.
    pub async fn resolve(
        &self,
        cluster: &ClusterTarget,
        request: &NewUpgradePolicy,
        desired: &VersionId,
        ack: Option<&str>,
    ) -> Result<Vec<GateAgreement>, OuoError> {
        let gates = self.discover(cluster, request).await?;
        if gates.is_empty() {
            return Ok(Vec::new());
        }
        check_acknowledgment(&gates, desired, ack)?;
        self.acknowledge(cluster, &gates).await
    }
}
