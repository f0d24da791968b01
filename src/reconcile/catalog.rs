// ABOUTME: Manifest catalog builder: reads registry state into normalized records.
// ABOUTME: Lowercases digests, substitutes the untagged sentinel, tolerates bad timestamps.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use nonempty::NonEmpty;

use crate::diagnostics::{Diagnostics, Warning};
use crate::registry::{RawManifest, RegistryError, RegistryOps};
use crate::types::Digest;

/// Tag shown for a manifest no tag points at.
pub const UNTAGGED: &str = "<untagged>";

/// One immutable manifest snapshot taken at catalog time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    pub digest: Digest,
    pub repository: String,
    /// Never empty: untagged manifests carry [`UNTAGGED`].
    pub tags: NonEmpty<String>,
    /// `None` when the registry reported no usable creation time.
    pub created_time: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

impl ManifestRecord {
    /// Normalize a raw registry manifest.
    ///
    /// Returns `None` (with a diagnostic) when the digest is unusable, since
    /// such a manifest cannot be addressed for deletion or matched by usage.
    pub fn from_raw(repository: &str, raw: RawManifest, diag: &mut Diagnostics) -> Option<Self> {
        let digest = match Digest::parse(&raw.digest) {
            Ok(digest) => digest,
            Err(e) => {
                diag.warn(Warning::invalid_digest(format!(
                    "skipping manifest in '{repository}' with unusable digest '{}': {e}",
                    raw.digest
                )));
                return None;
            }
        };

        let tags = raw
            .tags
            .and_then(NonEmpty::from_vec)
            .unwrap_or_else(|| NonEmpty::new(UNTAGGED.to_string()));

        let created_time = match raw.created_time.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => match parse_created_time(value) {
                Some(time) => Some(time),
                None => {
                    diag.warn(Warning::unparseable_timestamp(format!(
                        "could not parse creation time '{value}' for manifest {}",
                        digest.short()
                    )));
                    None
                }
            },
        };

        Some(Self {
            digest,
            repository: repository.to_string(),
            tags,
            created_time,
            size_bytes: raw.size_bytes,
        })
    }

    /// Whether no real tag points at this manifest.
    pub fn is_untagged(&self) -> bool {
        self.tags.len() == 1 && self.tags.first() == UNTAGGED
    }

    /// Tags joined for display, e.g. `v1, latest`.
    pub fn tags_display(&self) -> String {
        self.tags.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    }

    /// Whole days between creation and `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_time.map(|created| (now - created).num_days())
    }
}

/// Parse an ISO-8601 creation time. Values without an offset are taken as UTC.
pub fn parse_created_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Repository name → manifests, ordered by repository name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    repositories: BTreeMap<String, Vec<ManifestRecord>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a repository's manifests, replacing any previous entry.
    pub fn insert(&mut self, repository: impl Into<String>, manifests: Vec<ManifestRecord>) {
        self.repositories.insert(repository.into(), manifests);
    }

    pub fn get(&self, repository: &str) -> Option<&[ManifestRecord]> {
        self.repositories.get(repository).map(Vec::as_slice)
    }

    pub fn repositories(&self) -> impl Iterator<Item = (&str, &[ManifestRecord])> {
        self.repositories
            .iter()
            .map(|(name, manifests)| (name.as_str(), manifests.as_slice()))
    }

    pub fn manifests(&self) -> impl Iterator<Item = &ManifestRecord> {
        self.repositories.values().flatten()
    }

    pub fn repository_count(&self) -> usize {
        self.repositories.len()
    }

    pub fn manifest_count(&self) -> usize {
        self.repositories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest_count() == 0
    }
}

impl FromIterator<ManifestRecord> for Catalog {
    fn from_iter<I: IntoIterator<Item = ManifestRecord>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for record in iter {
            catalog
                .repositories
                .entry(record.repository.clone())
                .or_default()
                .push(record);
        }
        catalog
    }
}

/// Read every repository and manifest from the registry.
///
/// Any listing failure aborts: a partial catalog could under-report unused
/// manifests or miscount protected ones. Repositories are listed with at
/// most `concurrency` requests in flight.
pub async fn build_catalog<R: RegistryOps + ?Sized>(
    registry: &R,
    concurrency: usize,
    diag: &mut Diagnostics,
) -> Result<Catalog, RegistryError> {
    let repositories = registry.list_repositories().await?;
    tracing::info!(count = repositories.len(), "found repositories");

    let listings: Vec<(String, Vec<RawManifest>)> = stream::iter(repositories)
        .map(|repository| async move {
            tracing::debug!(%repository, "listing manifests");
            let manifests = registry.list_manifests(&repository).await?;
            Ok::<_, RegistryError>((repository, manifests))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut catalog = Catalog::new();
    for (repository, raw_manifests) in listings {
        let manifests: Vec<ManifestRecord> = raw_manifests
            .into_iter()
            .filter_map(|raw| ManifestRecord::from_raw(&repository, raw, diag))
            .collect();

        tracing::debug!(
            %repository,
            manifests = manifests.len(),
            tags = manifests.iter().map(|m| m.tags.len()).sum::<usize>(),
            "catalogued repository"
        );
        catalog.insert(repository, manifests);
    }

    tracing::info!(total = catalog.manifest_count(), "catalogued manifests");
    Ok(catalog)
}
