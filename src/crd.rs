//! `OpenShiftUpgrade` CRD type definition.

pub mod spec;
pub mod status;
pub mod types;

pub use spec::{OpenShiftUpgrade, OpenShiftUpgradeSpec};
pub use status::{OpenShiftUpgradeStatus, ScheduledUpgrade, UpgradeCondition};
pub use types::UpgradePhase;
