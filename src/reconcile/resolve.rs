// ABOUTME: Reference resolver building the digest-keyed usage index.
// ABOUTME: Tags are resolved through the registry; unresolvable references protect nothing.

use std::collections::BTreeMap;

use futures::{StreamExt, stream};
use nonempty::NonEmpty;

use super::usage::ImageUsage;
use crate::diagnostics::{Diagnostics, Warning};
use crate::registry::{RegistryError, RegistryOps};
use crate::types::{Digest, ImageReference, ReferenceTarget, WorkloadInstance};

/// Digest → workload instances referencing it.
///
/// Only obtainable from [`UsageIndexBuilder::finish`], so classification
/// never sees an index that is still being filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageIndex {
    digests: BTreeMap<Digest, NonEmpty<WorkloadInstance>>,
}

impl UsageIndex {
    pub fn builder() -> UsageIndexBuilder {
        UsageIndexBuilder::default()
    }

    pub fn referenced_by(&self, digest: &Digest) -> Option<&NonEmpty<WorkloadInstance>> {
        self.digests.get(digest)
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.digests.contains_key(digest)
    }

    /// Number of distinct digests in use.
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Accumulates provenance per digest.
#[derive(Debug, Default)]
pub struct UsageIndexBuilder {
    digests: BTreeMap<Digest, NonEmpty<WorkloadInstance>>,
}

impl UsageIndexBuilder {
    /// Append `instances` to the digest's list, inserting the list if new.
    /// Duplicates are kept: each entry is one referencing instance.
    pub fn record(&mut self, digest: Digest, instances: &NonEmpty<WorkloadInstance>) {
        match self.digests.get_mut(&digest) {
            Some(existing) => {
                for instance in instances {
                    existing.push(instance.clone());
                }
            }
            None => {
                self.digests.insert(digest, instances.clone());
            }
        }
    }

    pub fn finish(self) -> UsageIndex {
        UsageIndex {
            digests: self.digests,
        }
    }
}

/// Resolve every collected image reference to a manifest digest.
///
/// Digest references are taken as-is; tag references (default `latest`)
/// are looked up in the registry, up to `concurrency` at a time. A
/// reference that fails to parse or resolve is reported and dropped: it
/// cannot protect a manifest from deletion.
pub async fn resolve_references<R: RegistryOps + ?Sized>(
    usage: &ImageUsage,
    login_server: &str,
    registry: &R,
    concurrency: usize,
    diag: &mut Diagnostics,
) -> UsageIndex {
    let mut parsed = Vec::with_capacity(usage.len());
    for (image, instances) in usage.references() {
        match ImageReference::parse(image, login_server) {
            Ok(reference) => parsed.push((image, instances, reference)),
            Err(e) => diag.warn(Warning::unresolved_reference(format!(
                "cannot parse image reference '{image}': {e}"
            ))),
        }
    }

    let resolved: Vec<_> = stream::iter(parsed)
        .map(|(image, instances, reference)| async move {
            let digest = match reference.target() {
                ReferenceTarget::Digest(digest) => Ok(digest.clone()),
                ReferenceTarget::Tag(tag) => {
                    registry.resolve_tag(reference.repository(), tag).await
                }
            };
            (image, instances, reference, digest)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut builder = UsageIndex::builder();
    for (image, instances, reference, digest) in resolved {
        match digest {
            Ok(digest) => {
                tracing::debug!(%image, digest = %digest.short(), "resolved reference");
                builder.record(digest, instances);
            }
            Err(e) => diag.warn(unresolved_warning(&reference, &e)),
        }
    }

    let index = builder.finish();
    tracing::info!(digests = index.len(), "manifest digests in use");
    index
}

fn unresolved_warning(reference: &ImageReference, error: &RegistryError) -> Warning {
    Warning::unresolved_reference(format!(
        "failed to resolve '{reference}', it will not protect any manifest: {error}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(value: &str) -> Digest {
        Digest::parse(value).unwrap()
    }

    #[test]
    fn record_concatenates_without_dedup() {
        let mut builder = UsageIndex::builder();
        let a = NonEmpty::new(WorkloadInstance::primary("a"));
        let ab = NonEmpty::from_vec(vec![
            WorkloadInstance::primary("a"),
            WorkloadInstance::primary("b"),
        ])
        .unwrap();

        builder.record(digest("sha256:d"), &a);
        builder.record(digest("SHA256:D"), &ab);
        let index = builder.finish();

        assert_eq!(index.len(), 1);
        let names: Vec<String> = index
            .referenced_by(&digest("sha256:d"))
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["a", "a", "b"]);
    }

    #[test]
    fn empty_builder_finishes_empty() {
        let index = UsageIndex::builder().finish();
        assert!(index.is_empty());
        assert!(!index.contains(&digest("sha256:d")));
    }
}
