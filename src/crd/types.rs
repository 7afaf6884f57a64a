//! Enum types for the upgrade phase.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Phase of an `OpenShiftUpgrade`.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum UpgradePhase {
    /// Nothing decided yet (cluster version or desired version unknown).
    Pending,
    /// The cluster runs the desired version, or has moved past it.
    Converged,
    /// An upgrade policy for the desired version exists.
    Scheduled,
    /// Waiting on the user or on an in-flight rollout.
    Blocked,
    /// The declaration cannot be applied as written.
    Failed,
}

impl std::fmt::Display for UpgradePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Converged => write!(f, "Converged"),
            Self::Scheduled => write!(f, "Scheduled"),
            Self::Blocked => write!(f, "Blocked"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
