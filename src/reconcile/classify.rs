// ABOUTME: Reconciliation classifier partitioning old manifests by usage.
// ABOUTME: Every old manifest lands in exactly one of unused-eligible or old-but-referenced.

use nonempty::NonEmpty;

use super::catalog::{Catalog, ManifestRecord};
use super::resolve::UsageIndex;
use crate::types::WorkloadInstance;

/// An old manifest kept because workloads still reference it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedManifest {
    pub manifest: ManifestRecord,
    pub referenced_by: NonEmpty<WorkloadInstance>,
}

/// Disjoint partition of the old-manifest set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Old and unreferenced: deletion candidates.
    pub unused_eligible: Vec<ManifestRecord>,
    /// Old but still referenced: never deleted, reported as a warning.
    pub old_but_referenced: Vec<ProtectedManifest>,
}

impl Classification {
    /// Number of classified manifests (equals the old-set size).
    pub fn total(&self) -> usize {
        self.unused_eligible.len() + self.old_but_referenced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Partition `old` by digest membership in `index`.
///
/// Both sides carry normalized lowercase digests, so membership is exact.
pub fn classify(old: &Catalog, index: &UsageIndex) -> Classification {
    let mut classification = Classification::default();

    for manifest in old.manifests() {
        match index.referenced_by(&manifest.digest) {
            None => {
                tracing::debug!(
                    digest = %manifest.digest.short(),
                    tags = %manifest.tags_display(),
                    "unused"
                );
                classification.unused_eligible.push(manifest.clone());
            }
            Some(instances) => {
                tracing::debug!(
                    digest = %manifest.digest.short(),
                    tags = %manifest.tags_display(),
                    "in use"
                );
                classification.old_but_referenced.push(ProtectedManifest {
                    manifest: manifest.clone(),
                    referenced_by: instances.clone(),
                });
            }
        }
    }

    tracing::info!(
        unused = classification.unused_eligible.len(),
        protected = classification.old_but_referenced.len(),
        "classification complete"
    );
    classification
}
