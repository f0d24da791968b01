// ABOUTME: Aggregate figures derived from a classification.
// ABOUTME: Reclaimable size for candidates; age and reach statistics for protected manifests.

use std::collections::HashSet;

use serde::Serialize;

use super::age::AgePolicy;
use super::classify::Classification;

/// Summary consumed by console reporting and the audit file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub candidate_count: usize,
    pub reclaimable_bytes: u64,
    /// `None` when no old manifest is still referenced.
    pub protected: Option<ProtectedSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectedSummary {
    pub count: usize,
    pub total_bytes: u64,
    pub oldest_age_days: i64,
    pub average_age_days: f64,
    /// How far the oldest protected manifest is past the threshold.
    pub oldest_days_over_threshold: i64,
    /// Distinct instances across all protected manifests.
    pub affected_workloads: usize,
}

pub fn summarize(classification: &Classification, policy: &AgePolicy) -> Summary {
    let reclaimable_bytes = classification
        .unused_eligible
        .iter()
        .map(|m| m.size_bytes)
        .sum();

    Summary {
        candidate_count: classification.unused_eligible.len(),
        reclaimable_bytes,
        protected: summarize_protected(classification, policy),
    }
}

fn summarize_protected(
    classification: &Classification,
    policy: &AgePolicy,
) -> Option<ProtectedSummary> {
    let protected = &classification.old_but_referenced;
    if protected.is_empty() {
        return None;
    }

    let ages: Vec<i64> = protected
        .iter()
        .filter_map(|p| policy.age_days(&p.manifest))
        .collect();
    let oldest_age_days = ages.iter().copied().max().unwrap_or(0);
    let average_age_days = if ages.is_empty() {
        0.0
    } else {
        ages.iter().sum::<i64>() as f64 / ages.len() as f64
    };

    let affected: HashSet<_> = protected
        .iter()
        .flat_map(|p| p.referenced_by.iter())
        .collect();

    Some(ProtectedSummary {
        count: protected.len(),
        total_bytes: protected.iter().map(|p| p.manifest.size_bytes).sum(),
        oldest_age_days,
        average_age_days,
        oldest_days_over_threshold: oldest_age_days - i64::from(policy.threshold_days()),
        affected_workloads: affected.len(),
    })
}
