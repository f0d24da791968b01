// ABOUTME: Property tests for classification and digest normalization.
// ABOUTME: Partitions must be complete and disjoint for any catalog and usage index.

use std::collections::HashSet;

use acr_sweep::diagnostics::Diagnostics;
use acr_sweep::reconcile::{AgePolicy, Catalog, ManifestRecord, UsageIndex, classify, filter_old};
use acr_sweep::types::{Digest, WorkloadInstance};
use chrono::{Duration, TimeZone, Utc};
use nonempty::NonEmpty;
use proptest::prelude::*;

/// Distinct hex digests so each generated manifest is its own identity.
fn arb_digests() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[0-9a-f]{12}", 0..24)
        .prop_map(|set| set.into_iter().map(|hex| format!("sha256:{hex}")).collect())
}

fn arb_repository() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["api", "web", "team/worker", "base"]).prop_map(String::from)
}

/// A manifest per digest, with an age (or none) and a repository.
fn arb_manifests() -> impl Strategy<Value = Vec<ManifestRecord>> {
    arb_digests().prop_flat_map(|digests| {
        let n = digests.len();
        (
            Just(digests),
            prop::collection::vec(arb_repository(), n),
            prop::collection::vec(prop::option::weighted(0.9, 0i64..120), n),
        )
            .prop_map(|(digests, repositories, ages)| {
                let now = reference_now();
                digests
                    .into_iter()
                    .zip(repositories)
                    .zip(ages)
                    .map(|((digest, repository), age)| ManifestRecord {
                        digest: Digest::parse(&digest).unwrap(),
                        repository,
                        tags: NonEmpty::new("v1".to_string()),
                        created_time: age.map(|days| now - Duration::days(days) - Duration::hours(1)),
                        size_bytes: 1024,
                    })
                    .collect()
            })
    })
}

fn reference_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn index_of(manifests: &[ManifestRecord], used: &[bool]) -> UsageIndex {
    let mut builder = UsageIndex::builder();
    for (manifest, used) in manifests.iter().zip(used) {
        if *used {
            builder.record(
                manifest.digest.clone(),
                &NonEmpty::new(WorkloadInstance::primary("app")),
            );
        }
    }
    builder.finish()
}

proptest! {
    #[test]
    fn classification_partitions_old_set(
        (manifests, used) in arb_manifests().prop_flat_map(|m| {
            let n = m.len();
            (Just(m), prop::collection::vec(any::<bool>(), n))
        }),
        threshold in 0u32..90,
    ) {
        let catalog: Catalog = manifests.iter().cloned().collect();
        let policy = AgePolicy::new(threshold, reference_now());
        let mut diag = Diagnostics::default();
        let old = filter_old(&catalog, &policy, &mut diag);
        let index = index_of(&manifests, &used);

        let classification = classify(&old, &index);

        let unused: HashSet<&Digest> =
            classification.unused_eligible.iter().map(|m| &m.digest).collect();
        let protected: HashSet<&Digest> = classification
            .old_but_referenced
            .iter()
            .map(|p| &p.manifest.digest)
            .collect();

        prop_assert_eq!(classification.total(), old.manifest_count());
        prop_assert!(unused.is_disjoint(&protected));
        for manifest in old.manifests() {
            prop_assert!(unused.contains(&manifest.digest) || protected.contains(&manifest.digest));
        }
        for digest in &unused {
            prop_assert!(!index.contains(digest));
        }
        for digest in &protected {
            prop_assert!(index.contains(digest));
        }
    }

    #[test]
    fn old_set_holds_only_dated_manifests_past_cutoff(
        manifests in arb_manifests(),
        threshold in 0u32..90,
    ) {
        let catalog: Catalog = manifests.into_iter().collect();
        let policy = AgePolicy::new(threshold, reference_now());
        let mut diag = Diagnostics::default();

        let old = filter_old(&catalog, &policy, &mut diag);

        for manifest in old.manifests() {
            let created = manifest.created_time.unwrap();
            prop_assert!(created < policy.cutoff());
        }
    }

    #[test]
    fn digest_identity_ignores_case(hex in "[0-9a-fA-F]{8,64}") {
        let lower = Digest::parse(&format!("sha256:{}", hex.to_lowercase())).unwrap();
        let mixed = Digest::parse(&format!("SHA256:{hex}")).unwrap();

        prop_assert_eq!(&lower, &mixed);
        prop_assert_eq!(mixed.as_str(), mixed.as_str().to_lowercase());
    }
}
