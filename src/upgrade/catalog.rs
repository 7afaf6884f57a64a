//! Installable version catalog for a channel group.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::OuoError;
use crate::ocm::{ClusterManagementClient, ClusterTopology, VersionQuery};

use super::version::{VERSION_PREFIX, VersionId, remote_version_id};

/// Page size used when walking the catalog.
pub const PAGE_SIZE: u32 = 100;

const ORDER: &str = "default desc, id desc";

/// One listed version. `version` is `None` when the raw id does not parse.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: String,
    pub raw_id: String,
    pub version: Option<VersionId>,
}

/// Descending by version, raw id breaking ties. Unparseable entries go last.
fn by_version_desc(a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
    match (&a.version, &b.version) {
        (Some(va), Some(vb)) => vb.cmp(va).then_with(|| b.raw_id.cmp(&a.raw_id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.raw_id.cmp(&a.raw_id),
    }
}

pub struct VersionCatalog<'a, C: ClusterManagementClient + ?Sized> {
    client: &'a C,
    topology: ClusterTopology,
}

impl<'a, C: ClusterManagementClient + ?Sized> VersionCatalog<'a, C> {
    pub const fn new(client: &'a C, topology: ClusterTopology) -> Self {
        Self { client, topology }
    }

    /// Search expression selecting installable versions in a channel group.
    pub fn search_filter(&self, channel_group: &str) -> String {
        let mut filter = format!(
            "enabled = 'true' AND rosa_enabled = 'true' AND channel_group = '{channel_group}'"
        );
        if self.topology == ClusterTopology::Hcp {
            filter.push_str(" AND hosted_control_plane_enabled = 'true'");
        }
        filter
    }

    /// All installable versions in the channel group, highest first.
    pub async fn list_versions(&self, channel_group: &str) -> Result<Vec<CatalogEntry>, OuoError> {
        let search = self.search_filter(channel_group);
        let mut entries = Vec::new();
        let mut page = 1;

        loop {
            let query = VersionQuery {
                search: search.clone(),
                order: ORDER.to_string(),
                page,
                size: PAGE_SIZE,
            };
            let result = self
                .client
                .list_versions(&query)
                .await
                .map_err(|source| OuoError::CatalogFetch {
                    channel_group: channel_group.to_string(),
                    source,
                })?;

            let count = result.items.len();
            entries.extend(result.items.into_iter().map(|v| CatalogEntry {
                version: VersionId::parse_in_channel(&v.raw_id, channel_group).ok(),
                id: v.id,
                raw_id: v.raw_id,
            }));

            if count < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }

        if entries.is_empty() {
            return Err(OuoError::EmptyCatalog(channel_group.to_string()));
        }

        entries.sort_by(by_version_desc);
        debug!(
            "Listed {} versions in channel group {} ({} pages)",
            entries.len(),
            channel_group,
            page
        );
        Ok(entries)
    }

    /// Pick the requested version from the catalog, or the newest one when
    /// nothing is requested.
    pub async fn resolve_requested_version(
        &self,
        channel_group: &str,
        requested: Option<&str>,
    ) -> Result<VersionId, OuoError> {
        if let Some(requested) = requested
            && requested.trim().starts_with(VERSION_PREFIX)
        {
            return Err(OuoError::UnsupportedPrefix(requested.to_string()));
        }

        let entries = self.list_versions(channel_group).await?;

        let Some(requested) = requested else {
            return match entries.first() {
                Some(CatalogEntry {
                    version: Some(v), ..
                }) => Ok(v.clone()),
                Some(entry) => Err(OuoError::version_parse(&entry.raw_id, "not a semantic version")),
                None => Err(OuoError::EmptyCatalog(channel_group.to_string())),
            };
        };

        let wanted = VersionId::parse(requested)?;
        let offered = entries
            .iter()
            .filter_map(|e| e.version.as_ref())
            .find(|v| **v == wanted)
            .cloned();
        offered.ok_or_else(|| OuoError::VersionNotOffered {
            requested: requested.to_string(),
            available: entries.into_iter().map(|e| e.raw_id).collect(),
        })
    }

    /// Versions the cluster may upgrade to directly from `current`.
    ///
    /// `current_id` is the remote id of the version the cluster runs. Upgrade
    /// targets are looked up in that version's own channel group, which may
    /// differ from the one the user declares.
    pub async fn available_upgrades(
        &self,
        channel_group: &str,
        current: &VersionId,
        current_id: Option<&str>,
    ) -> Result<Vec<VersionId>, OuoError> {
        let record_id = current_id
            .filter(|id| !id.is_empty())
            .map_or_else(|| remote_version_id(&current.to_string(), channel_group), ToString::to_string);
        let record = self
            .client
            .get_version(&record_id)
            .await
            .map_err(|source| OuoError::CatalogFetch {
                channel_group: channel_group.to_string(),
                source,
            })?;

        let source_group = if record.channel_group.is_empty() {
            channel_group
        } else {
            record.channel_group.as_str()
        };
        let fetch_err = |source| OuoError::CatalogFetch {
            channel_group: source_group.to_string(),
            source,
        };

        let mut upgrades = Vec::with_capacity(record.available_upgrades.len());
        for raw in &record.available_upgrades {
            let candidate = self
                .client
                .get_version(&remote_version_id(raw, source_group))
                .await
                .map_err(fetch_err)?;
            if !candidate.installable_on(self.topology) {
                debug!("Skipping {} (not installable on {})", raw, self.topology);
                continue;
            }
            match VersionId::parse_in_channel(&candidate.raw_id, source_group) {
                Ok(v) => upgrades.push(v),
                Err(e) => debug!("Skipping upgrade target {}: {}", raw, e),
            }
        }

        upgrades.sort_by(|a, b| b.cmp(a));
        Ok(upgrades)
    }

    /// Fails with `VersionNotOffered` unless `desired` is a direct upgrade of `current`.
    pub async fn validate_upgrade(
        &self,
        channel_group: &str,
        current: &VersionId,
        current_id: Option<&str>,
        desired: &VersionId,
    ) -> Result<(), OuoError> {
        let available = self
            .available_upgrades(channel_group, current, current_id)
            .await?;
        if available.contains(desired) {
            return Ok(());
        }
        Err(OuoError::VersionNotOffered {
            requested: desired.to_string(),
            available: available.iter().map(ToString::to_string).collect(),
        })
    }
}
