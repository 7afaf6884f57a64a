//! OpenShift version identifiers.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::error::OuoError;

/// Legacy product prefix carried by remote version ids (`openshift-v4.14.1`).
pub const VERSION_PREFIX: &str = "openshift-v";

pub const DEFAULT_CHANNEL_GROUP: &str = "stable";

/// Channel groups whose name may trail a remote version id.
const KNOWN_CHANNEL_GROUPS: &[&str] = &["fast", "candidate", "nightly", "eus", "stable"];

/// Remote version id for a raw version in a channel group.
///
/// `stable` versions carry no suffix: `4.14.1` → `openshift-v4.14.1`,
/// `4.14.1` in `candidate` → `openshift-v4.14.1-candidate`.
pub fn remote_version_id(raw: &str, channel_group: &str) -> String {
    if channel_group.is_empty() || channel_group == DEFAULT_CHANNEL_GROUP {
        format!("{VERSION_PREFIX}{raw}")
    } else {
        format!("{VERSION_PREFIX}{raw}-{channel_group}")
    }
}

/// A normalized OpenShift version.
///
/// Equality, ordering and hashing look only at major.minor.patch and the
/// pre-release tag. Build metadata is parsed but never compared.
#[derive(Debug, Clone)]
pub struct VersionId {
    version: semver::Version,
}

impl VersionId {
    /// Parse a version string, stripping the legacy prefix and any known
    /// channel-group suffix.
    pub fn parse(raw: &str) -> Result<Self, OuoError> {
        let trimmed = raw.trim();
        let body = strip_prefix(trimmed);
        let core = KNOWN_CHANNEL_GROUPS
            .iter()
            .find_map(|group| body.strip_suffix(&format!("-{group}")))
            .unwrap_or(body);
        Self::from_core(raw, core)
    }

    /// Parse a version listed under a specific channel group.
    pub fn parse_in_channel(raw: &str, channel_group: &str) -> Result<Self, OuoError> {
        let trimmed = raw.trim();
        let body = strip_prefix(trimmed);
        let core = if channel_group == DEFAULT_CHANNEL_GROUP {
            body
        } else {
            body.strip_suffix(&format!("-{channel_group}"))
                .unwrap_or(body)
        };
        Self::from_core(raw, core)
    }

    fn from_core(raw: &str, core: &str) -> Result<Self, OuoError> {
        if core.is_empty() {
            return Err(OuoError::version_parse(raw, "empty version"));
        }
        let version =
            semver::Version::parse(&pad_minor_only(core)).map_err(|e| OuoError::version_parse(raw, e))?;
        Ok(Self { version })
    }

    /// `major.minor`, the form acknowledgment tokens are compared against.
    pub fn minor_string(&self) -> String {
        format!("{}.{}", self.version.major, self.version.minor)
    }

    fn key(&self) -> (u64, u64, u64, &semver::Prerelease) {
        (
            self.version.major,
            self.version.minor,
            self.version.patch,
            &self.version.pre,
        )
    }
}

fn strip_prefix(s: &str) -> &str {
    s.strip_prefix(VERSION_PREFIX).unwrap_or(s)
}

/// Read `4.14` as `4.14.0`; leave anything else to the semver parser.
fn pad_minor_only(core: &str) -> String {
    let numeric_end = core.find(['-', '+']).unwrap_or(core.len());
    let (numeric, rest) = core.split_at(numeric_end);
    if numeric.matches('.').count() == 1 {
        format!("{numeric}.0{rest}")
    } else {
        core.to_string()
    }
}

impl PartialEq for VersionId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for VersionId {}

impl Hash for VersionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.version.major, self.version.minor, self.version.patch
        )?;
        if !self.version.pre.is_empty() {
            write!(f, "-{}", self.version.pre)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> VersionId {
        VersionId::parse(s).unwrap()
    }

    #[test]
    fn test_parse_plain() {
        let version = v("4.14.1");
        assert_eq!(
            (version.version.major, version.version.minor, version.version.patch),
            (4, 14, 1)
        );
        assert_eq!(version.to_string(), "4.14.1");
    }

    #[test]
    fn test_parse_strips_decoration() {
        let version = v("openshift-v4.14.1-candidate");
        assert_eq!(version, v("4.14.1"));
        assert_eq!(version.to_string(), "4.14.1");
    }

    #[test]
    fn test_parse_keeps_prerelease_before_channel_suffix() {
        let version = v("openshift-v4.15.0-rc.2-candidate");
        assert!(!version.version.pre.is_empty());
        assert_eq!(version.to_string(), "4.15.0-rc.2");
        assert_ne!(version, v("4.15.0"));
        assert!(version < v("4.15.0"));
    }

    #[test]
    fn test_parse_in_channel() {
        let version = VersionId::parse_in_channel("openshift-v4.14.1-fast", "fast").unwrap();
        assert_eq!(version, v("4.14.1"));

        let stable = VersionId::parse_in_channel("4.14.1", "stable").unwrap();
        assert_eq!(stable, v("4.14.1"));

        // Only the listed channel group's suffix is stripped
        let other = VersionId::parse_in_channel("4.14.1-fast", "candidate").unwrap();
        assert_ne!(other, v("4.14.1"));
    }

    #[test]
    fn test_parse_two_components() {
        assert_eq!(v("4.14"), v("4.14.0"));
        assert_eq!(v("4.15-rc.1").to_string(), "4.15.0-rc.1");
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            VersionId::parse("invalid"),
            Err(OuoError::VersionParse { .. })
        ));
        assert!(VersionId::parse("").is_err());
        assert!(VersionId::parse("openshift-v").is_err());
        assert!(VersionId::parse("4.x.1").is_err());
    }

    #[test]
    fn test_equality_ignores_build_metadata() {
        assert_eq!(v("4.14.1+build.7"), v("4.14.1"));
        assert_eq!(v("4.14.1+build.7").cmp(&v("4.14.1")), Ordering::Equal);
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert!(v("4.9.0") < v("4.10.0"));
        assert!(v("4.14.10") > v("4.14.9"));
        assert!(v("5.0.0") > v("4.99.99"));
    }

    #[test]
    fn test_minor_string() {
        assert_eq!(v("4.14.1").minor_string(), "4.14");
        assert_eq!(v("openshift-v4.9.3-fast").minor_string(), "4.9");
    }

    #[test]
    fn test_remote_version_id() {
        assert_eq!(remote_version_id("4.14.1", "stable"), "openshift-v4.14.1");
        assert_eq!(
            remote_version_id("4.14.1", "candidate"),
            "openshift-v4.14.1-candidate"
        );
        assert_eq!(remote_version_id("4.14.1", ""), "openshift-v4.14.1");
    }
}
