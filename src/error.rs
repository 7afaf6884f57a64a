//! Custom error types for ouo.

use thiserror::Error;

use crate::ocm::types::{ApiErrorBody, VersionGate};

/// Errors returned by the OCM API client.
///
/// The first field of every variant names the operation that failed.
#[derive(Error, Debug)]
pub enum OcmError {
    #[error("[{0}] request failed: {1}")]
    Transport(String, String),

    #[error("[{0}] not found")]
    NotFound(String),

    #[error(
        "[{operation}] missing version gate agreements: {}",
        .gates.iter().map(|g| g.id.as_str()).collect::<Vec<_>>().join(", ")
    )]
    GateAgreementsRequired {
        operation: String,
        gates: Vec<VersionGate>,
    },

    #[error("[{operation}] OCM API returned {status} ({code}): {reason}")]
    Api {
        operation: String,
        status: u16,
        code: String,
        reason: String,
    },

    #[error("[{0}] failed to decode response: {1}")]
    Decode(String, String),
}

impl OcmError {
    /// Classify a non-success OCM response.
    ///
    /// A rejection whose `details` decode as a non-empty list of version gates
    /// becomes `GateAgreementsRequired`; a list whose first gate carries no id
    /// is not a gate list and is reported as a plain API error.
    pub fn from_response(operation: &str, status: u16, body: &str) -> Self {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();

        if status == 404 {
            return Self::NotFound(operation.to_string());
        }

        if let Some(details) = parsed.details.clone()
            && let Ok(gates) = serde_json::from_value::<Vec<VersionGate>>(details)
            && gates.first().is_some_and(|g| !g.id.is_empty())
        {
            return Self::GateAgreementsRequired {
                operation: operation.to_string(),
                gates,
            };
        }

        let reason = if parsed.reason.is_empty() {
            body.trim().to_string()
        } else {
            parsed.reason
        };

        Self::Api {
            operation: operation.to_string(),
            status,
            code: parsed.code,
            reason,
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if repeating the request later may succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_, _) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Errors surfaced by the upgrade engine and the controller.
#[derive(Error, Debug)]
pub enum OuoError {
    #[error("OpenShift version must be provided without the \"openshift-v\" prefix (got '{0}')")]
    UnsupportedPrefix(String),

    #[error(
        "version {requested} is not in the list of available versions: [{}]",
        .available.join(", ")
    )]
    VersionNotOffered {
        requested: String,
        available: Vec<String>,
    },

    #[error("failed to parse version '{version}': {reason}")]
    VersionParse { version: String, reason: String },

    #[error(
        "cluster version {current} is already above the requested version {desired}, downgrades are not supported"
    )]
    DowngradeNotSupported { current: String, desired: String },

    #[error(
        "{gate_descriptions}\nTo acknowledge these items, set upgradeAcknowledgementsFor to \"{required_minor}\" (currently {}) and re-apply the changes",
        .provided_ack.as_deref().map_or_else(|| "unset".to_string(), |a| format!("\"{a}\""))
    )]
    MissingAcknowledgment {
        required_minor: String,
        provided_ack: Option<String>,
        gate_descriptions: String,
    },

    #[error("failed to retrieve versions for channel group '{channel_group}': {source}")]
    CatalogFetch {
        channel_group: String,
        source: OcmError,
    },

    #[error("could not find any versions in channel group '{0}'")]
    EmptyCatalog(String),

    #[error("failed to schedule upgrade to {version}: {source}")]
    Scheduling { version: String, source: OcmError },

    #[error("failed to acknowledge version gate '{gate_id}' for cluster '{cluster_id}': {source}")]
    GateAcknowledgment {
        gate_id: String,
        cluster_id: String,
        source: OcmError,
    },

    #[error("failed to inspect upgrade policies for cluster '{cluster_id}': {source}")]
    PolicyLookup { cluster_id: String, source: OcmError },

    #[error("upgrade policy {policy_id} for cluster '{cluster_id}' still present after {waited_secs}s")]
    PolicyRemovalTimeout {
        cluster_id: String,
        policy_id: String,
        waited_secs: u64,
    },

    #[error("a cluster upgrade to {version} is already in progress for cluster '{cluster_id}'")]
    UpgradeInProgress { cluster_id: String, version: String },

    #[error("failed to read cluster '{cluster_id}': {source}")]
    ClusterLookup { cluster_id: String, source: OcmError },

    #[error("reconcile did not finish within {0}s")]
    ReconcileTimeout(u64),
}

impl OuoError {
    /// Returns true if this error is transient and the whole reconcile should be retried.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::CatalogFetch { source, .. } => !source.is_not_found(),
            Self::EmptyCatalog(_)
            | Self::Scheduling { .. }
            | Self::GateAcknowledgment { .. }
            | Self::PolicyLookup { .. }
            | Self::PolicyRemovalTimeout { .. }
            | Self::ClusterLookup { .. }
            | Self::ReconcileTimeout(_) => true,
            _ => false,
        }
    }

    /// Returns true if only a changed declaration can resolve this error.
    ///
    /// A version record missing from the catalog counts: the same lookup
    /// cannot succeed on retry.
    pub const fn needs_new_declaration(&self) -> bool {
        match self {
            Self::CatalogFetch { source, .. } => source.is_not_found(),
            Self::UnsupportedPrefix(_)
            | Self::VersionNotOffered { .. }
            | Self::VersionParse { .. }
            | Self::DowngradeNotSupported { .. }
            | Self::MissingAcknowledgment { .. } => true,
            _ => false,
        }
    }

    pub fn version_parse(version: &str, reason: impl std::fmt::Display) -> Self {
        Self::VersionParse {
            version: version.to_string(),
            reason: reason.to_string(),
        }
    }
}
