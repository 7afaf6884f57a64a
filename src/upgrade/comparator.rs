//! Direction of a (current, desired) version change.

use crate::error::OuoError;

use super::version::VersionId;

/// What a reconcile has to do to move from the current to the desired version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Nothing to do, not even cancellation.
    NoOp,
    Upgrade,
    Downgrade,
    /// Desired equals current: settle there, dropping any queued upgrade.
    CancelOnly,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOp => write!(f, "no-op"),
            Self::Upgrade => write!(f, "upgrade"),
            Self::Downgrade => write!(f, "downgrade"),
            Self::CancelOnly => write!(f, "cancel-only"),
        }
    }
}

/// Classify a version pair. Never returns [`Classification::NoOp`].
pub fn classify(current: &VersionId, desired: &VersionId) -> Classification {
    match desired.cmp(current) {
        std::cmp::Ordering::Equal => Classification::CancelOnly,
        std::cmp::Ordering::Less => Classification::Downgrade,
        std::cmp::Ordering::Greater => Classification::Upgrade,
    }
}

/// Parse both sides, classify, then apply the downgrade policy.
///
/// A downgrade is tolerated (as `NoOp`) only when the desired version is the
/// one that was already declared last time: the cluster moved past it on its
/// own. A fresh request to go backward is rejected.
pub fn compare(
    current: &str,
    desired: &str,
    previously_requested: Option<&str>,
) -> Result<(Classification, VersionId, VersionId), OuoError> {
    let current_id = VersionId::parse(current)?;
    let desired_id = VersionId::parse(desired)?;

    let classification = match classify(&current_id, &desired_id) {
        Classification::Downgrade if unchanged(&desired_id, previously_requested) => {
            Classification::NoOp
        }
        Classification::Downgrade => {
            return Err(OuoError::DowngradeNotSupported {
                current: current_id.to_string(),
                desired: desired_id.to_string(),
            });
        }
        other => other,
    };

    Ok((classification, current_id, desired_id))
}

fn unchanged(desired: &VersionId, previously_requested: Option<&str>) -> bool {
    previously_requested
        .and_then(|p| VersionId::parse(p).ok())
        .is_some_and(|p| p == *desired)
}
