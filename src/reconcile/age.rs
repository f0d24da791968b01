// ABOUTME: Age filter selecting manifests older than the retention threshold.
// ABOUTME: Undated manifests are skipped, never assumed old or new.

use chrono::{DateTime, Duration, Utc};

use super::catalog::{Catalog, ManifestRecord};
use crate::diagnostics::{Diagnostics, Warning};

/// Age threshold evaluated against a fixed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgePolicy {
    threshold_days: u32,
    now: DateTime<Utc>,
}

impl AgePolicy {
    pub fn new(threshold_days: u32, now: DateTime<Utc>) -> Self {
        Self {
            threshold_days,
            now,
        }
    }

    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Manifests created strictly before this instant are old.
    pub fn cutoff(&self) -> DateTime<Utc> {
        self.now - Duration::days(i64::from(self.threshold_days))
    }

    /// `None` when the manifest has no creation time.
    pub fn is_old(&self, manifest: &ManifestRecord) -> Option<bool> {
        manifest.created_time.map(|created| created < self.cutoff())
    }

    pub fn age_days(&self, manifest: &ManifestRecord) -> Option<i64> {
        manifest.age_days(self.now)
    }

    pub fn days_over_threshold(&self, manifest: &ManifestRecord) -> Option<i64> {
        self.age_days(manifest)
            .map(|age| age - i64::from(self.threshold_days))
    }
}

/// Keep only old manifests. Repositories with none left are dropped.
pub fn filter_old(catalog: &Catalog, policy: &AgePolicy, diag: &mut Diagnostics) -> Catalog {
    tracing::info!(cutoff = %policy.cutoff(), "filtering manifests by age");

    let mut old = Catalog::new();
    for (repository, manifests) in catalog.repositories() {
        let mut kept = Vec::new();
        for manifest in manifests {
            match policy.is_old(manifest) {
                Some(true) => kept.push(manifest.clone()),
                Some(false) => {}
                None => diag.warn(Warning::undated_manifest(format!(
                    "manifest {} in '{repository}' has no creation time, skipping",
                    manifest.digest.short()
                ))),
            }
        }

        if !kept.is_empty() {
            tracing::debug!(%repository, old = kept.len(), "old manifests");
            old.insert(repository, kept);
        }
    }

    tracing::info!(
        old = old.manifest_count(),
        threshold_days = policy.threshold_days(),
        "age filter complete"
    );
    old
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Digest;
    use nonempty::NonEmpty;

    fn manifest(repo: &str, digest: &str, created: Option<DateTime<Utc>>) -> ManifestRecord {
        ManifestRecord {
            digest: Digest::parse(digest).unwrap(),
            repository: repo.to_string(),
            tags: NonEmpty::new("v1".to_string()),
            created_time: created,
            size_bytes: 10,
        }
    }

    #[test]
    fn cutoff_boundary_is_exclusive() {
        let now = Utc::now();
        let policy = AgePolicy::new(30, now);
        let exactly = manifest("svc", "sha256:01", Some(policy.cutoff()));
        let older = manifest(
            "svc",
            "sha256:02",
            Some(policy.cutoff() - Duration::seconds(1)),
        );
        assert_eq!(policy.is_old(&exactly), Some(false));
        assert_eq!(policy.is_old(&older), Some(true));
    }

    #[test]
    fn drops_repositories_without_old_manifests() {
        let now = Utc::now();
        let policy = AgePolicy::new(30, now);
        let catalog: Catalog = [
            manifest("fresh", "sha256:01", Some(now - Duration::days(2))),
            manifest("stale", "sha256:02", Some(now - Duration::days(90))),
            manifest("stale", "sha256:03", Some(now - Duration::days(1))),
        ]
        .into_iter()
        .collect();

        let mut diag = Diagnostics::default();
        let old = filter_old(&catalog, &policy, &mut diag);

        assert!(old.get("fresh").is_none());
        assert_eq!(old.get("stale").unwrap().len(), 1);
        assert!(!diag.has_warnings());
    }

    #[test]
    fn undated_manifests_are_never_old() {
        let policy = AgePolicy::new(0, Utc::now());
        let catalog: Catalog = [manifest("svc", "sha256:01", None)].into_iter().collect();

        let mut diag = Diagnostics::default();
        let old = filter_old(&catalog, &policy, &mut diag);

        assert!(old.is_empty());
        assert_eq!(diag.warnings().len(), 1);
    }

    #[test]
    fn days_over_threshold() {
        let now = Utc::now();
        let policy = AgePolicy::new(30, now);
        let m = manifest("svc", "sha256:01", Some(now - Duration::days(45)));
        assert_eq!(policy.age_days(&m), Some(45));
        assert_eq!(policy.days_over_threshold(&m), Some(15));
    }
}
