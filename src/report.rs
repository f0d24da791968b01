// ABOUTME: Console rendering of classification results.
// ABOUTME: Unused-manifest summary and the warning block for old manifests still in use.

use std::collections::BTreeMap;

use crate::reconcile::{AgePolicy, Classification, ManifestRecord, ProtectedManifest, Summary};

const RULE_WIDTH: usize = 80;

fn rule(c: char) -> String {
    c.to_string().repeat(RULE_WIDTH)
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn gb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

/// `1.50 GB (1536.00 MB)`
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} GB ({:.2} MB)", gb(bytes), mb(bytes))
}

fn created(manifest: &ManifestRecord) -> String {
    manifest
        .created_time
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Group by repository, oldest first within each.
fn by_repository<'a, T>(
    items: &'a [T],
    manifest: impl Fn(&T) -> &ManifestRecord,
) -> BTreeMap<&'a str, Vec<&'a T>> {
    let mut groups: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
    for item in items {
        groups
            .entry(manifest(item).repository.as_str())
            .or_default()
            .push(item);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|item| manifest(item).created_time);
    }
    groups
}

/// Lines describing every deletion candidate and the space they occupy.
pub fn unused_summary(classification: &Classification, policy: &AgePolicy) -> Vec<String> {
    let unused = &classification.unused_eligible;
    let mut lines = vec![rule('='), "UNUSED MANIFESTS SUMMARY".to_string(), rule('=')];

    if unused.is_empty() {
        lines.push(String::new());
        lines.push("No unused manifests found. Nothing to delete!".to_string());
        return lines;
    }

    for (repository, manifests) in by_repository(unused, |m| m) {
        lines.push(String::new());
        lines.push(format!("Repository: {repository}"));
        lines.push(rule('-'));
        for m in manifests {
            let age = policy.age_days(m).unwrap_or_default();
            lines.push(format!("  Digest:  {}", m.digest));
            lines.push(format!("  Tags:    {}", m.tags_display()));
            lines.push(format!("  Created: {} ({age} days ago)", created(m)));
            lines.push(format!("  Size:    {:.2} MB", mb(m.size_bytes)));
        }
    }

    let reclaimable: u64 = unused.iter().map(|m| m.size_bytes).sum();
    lines.push(String::new());
    lines.push(rule('='));
    lines.push(format!("Total manifests to delete: {}", unused.len()));
    lines.push(format!("Total space to reclaim: {}", format_size(reclaimable)));
    lines.push(rule('='));
    lines
}

/// Warning block for old manifests kept because workloads use them.
/// Empty when nothing is protected.
pub fn protected_warning(
    classification: &Classification,
    summary: &Summary,
    policy: &AgePolicy,
) -> Vec<String> {
    let (protected, Some(metrics)) = (&classification.old_but_referenced, &summary.protected)
    else {
        return Vec::new();
    };

    let mut lines = vec![
        rule('='),
        "WARNING: OLD MANIFESTS STILL IN USE".to_string(),
        rule('='),
        format!(
            "The following {} manifest(s) are older than {} days",
            protected.len(),
            policy.threshold_days()
        ),
        "but are still used by workloads and will NOT be deleted.".to_string(),
        "Consider updating these workloads to newer images.".to_string(),
    ];

    for (repository, entries) in by_repository(protected, |p: &ProtectedManifest| &p.manifest) {
        lines.push(String::new());
        lines.push(format!("Repository: {repository}"));
        lines.push(rule('-'));
        for entry in entries {
            let m = &entry.manifest;
            let mut used_by: Vec<String> =
                entry.referenced_by.iter().map(ToString::to_string).collect();
            used_by.sort();

            lines.push(format!("  Digest:   {}", m.digest));
            lines.push(format!("  Tags:     {}", m.tags_display()));
            lines.push(format!("  Created:  {}", created(m)));
            lines.push(format!(
                "  Age:      {} days old ({} days over threshold)",
                policy.age_days(m).unwrap_or_default(),
                policy.days_over_threshold(m).unwrap_or_default()
            ));
            lines.push(format!("  Size:     {:.2} MB", mb(m.size_bytes)));
            lines.push(format!("  Used by:  {} workload(s)", used_by.len()));
            lines.extend(used_by.iter().map(|w| format!("            - {w}")));
        }
    }

    lines.push(String::new());
    lines.push(rule('='));
    lines.push("OLD MANIFESTS IN USE - SUMMARY METRICS".to_string());
    lines.push(rule('='));
    lines.push(format!("Total old manifests in use:      {}", metrics.count));
    lines.push(format!(
        "Total size of old images:        {}",
        format_size(metrics.total_bytes)
    ));
    lines.push(format!(
        "Oldest manifest age:             {} days",
        metrics.oldest_age_days
    ));
    lines.push(format!(
        "Average age:                     {:.1} days",
        metrics.average_age_days
    ));
    lines.push(format!(
        "Threshold exceeded by (oldest):  {} days",
        metrics.oldest_days_over_threshold
    ));
    lines.push(format!(
        "Total workloads affected:        {}",
        metrics.affected_workloads
    ));
    lines.push(rule('='));
    lines
}
