//! OpenShift version upgrade decision engine.

pub mod catalog;
pub mod comparator;
pub mod engine;
pub mod gates;
pub mod scheduler;
pub mod version;

pub use catalog::VersionCatalog;
pub use engine::{ClusterVersionState, Decision, EngineSettings, NoOpReason, UpgradeDecisionEngine};
pub use scheduler::RemovalBackoff;
pub use version::DEFAULT_CHANNEL_GROUP;
