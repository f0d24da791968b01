// ABOUTME: JSON audit artifact for clean runs.
// ABOUTME: Records configuration, system info, classification results and deletion outcomes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::az::AzCli;
use crate::config::RunConfig;
use crate::reconcile::{
    AgePolicy, DeletionLedger, DeletionMode, ManifestRecord, ProtectedManifest, Reconciliation,
};

pub const AUDIT_FILE_VERSION: &str = "1.0";

const PROTECTED_STATUS: &str = "protected_from_deletion";
const PROTECTED_WARNING: &str =
    "These manifests are older than threshold but protected from deletion";

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to create audit directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write audit file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize audit: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Facts about the machine and tools running the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub platform: String,
    pub user: String,
    pub os_type: String,
    pub os_version: String,
    pub azure_cli_version: String,
    pub tool_version: String,
}

impl SystemInfo {
    pub async fn collect(az: &AzCli) -> Self {
        Self {
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            user: current_user(),
            os_type: std::env::consts::OS.to_string(),
            os_version: os_version(),
            azure_cli_version: az
                .version()
                .await
                .unwrap_or_else(|| "Unable to determine".to_string()),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn os_version() -> String {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Serialize)]
pub struct AuditLog {
    #[serde(skip)]
    pub started_at: DateTime<Utc>,
    pub audit_metadata: AuditMetadata,
    pub execution_info: ExecutionInfo,
    pub configuration: AuditConfiguration,
    pub system_info: SystemInfo,
    pub summary: AuditSummary,
    pub manifests: Vec<AuditManifest>,
    pub old_manifests_in_use: Vec<AuditProtectedManifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_summary: Option<DeletionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_deletions: Option<Vec<FailedDeletion>>,
}

#[derive(Debug, Serialize)]
pub struct AuditMetadata {
    pub audit_file_version: &'static str,
    pub script_version: &'static str,
    pub generated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ExecutionInfo {
    pub deletion_mode: DeletionMode,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    pub duration_human: String,
    pub executed_by: String,
}

#[derive(Debug, Serialize)]
pub struct AuditConfiguration {
    pub subscription_id: String,
    pub acr_name: String,
    pub acr_resource_group: String,
    pub image_age_threshold_days: u32,
}

#[derive(Debug, Serialize)]
pub struct AuditSummary {
    pub total_manifests_scanned: usize,
    pub manifests_older_than_threshold: usize,
    pub images_in_use: usize,
    pub unused_manifests_identified: usize,
    pub old_manifests_still_in_use: usize,
    pub old_manifests_still_in_use_warning: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct AuditManifest {
    pub repository: String,
    pub digest: String,
    pub tags: Vec<String>,
    pub created_time: Option<String>,
    pub age_days: Option<i64>,
    pub size_bytes: u64,
    pub size_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_result: Option<DeletionResult>,
}

#[derive(Debug, Serialize)]
pub struct AuditProtectedManifest {
    pub repository: String,
    pub digest: String,
    pub tags: Vec<String>,
    pub created_time: Option<String>,
    pub age_days: Option<i64>,
    pub days_over_threshold: Option<i64>,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub used_by_app_services: Vec<String>,
    pub app_service_count: usize,
    pub status: &'static str,
    pub warning: String,
}

#[derive(Debug, Serialize)]
pub struct DeletionResult {
    pub status: &'static str,
    pub repository: String,
    /// Comma-joined tag list.
    pub tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct DeletionSummary {
    pub total_attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct FailedDeletion {
    pub digest: String,
    pub error: String,
}

/// Inputs describing the run itself rather than its results.
#[derive(Debug, Clone)]
pub struct RunInfo<'a> {
    pub mode: DeletionMode,
    pub config: &'a RunConfig,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub system: SystemInfo,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn size_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / (1024.0 * 1024.0))
}

fn duration_human(seconds: f64) -> String {
    let whole = seconds.max(0.0) as u64;
    format!("{}m {}s", whole / 60, whole % 60)
}

fn oldest_first<T>(items: &mut [T], created: impl Fn(&T) -> Option<DateTime<Utc>>) {
    items.sort_by_key(|item| created(item));
}

fn audit_manifest(
    manifest: &ManifestRecord,
    policy: &AgePolicy,
    ledger: Option<&DeletionLedger>,
) -> AuditManifest {
    let deletion_result = ledger
        .and_then(|l| l.outcome_for(&manifest.repository, &manifest.digest))
        .map(|outcome| DeletionResult {
            status: if outcome.succeeded() {
                "success"
            } else {
                "failed"
            },
            repository: outcome.repository.clone(),
            tags: outcome.tags.iter().cloned().collect::<Vec<_>>().join(", "),
            error: outcome.error().map(str::to_string),
            timestamp: outcome.timestamp.to_rfc3339(),
        });

    AuditManifest {
        repository: manifest.repository.clone(),
        digest: manifest.digest.to_string(),
        tags: manifest.tags.iter().cloned().collect(),
        created_time: manifest.created_time.map(|t| t.to_rfc3339()),
        age_days: policy.age_days(manifest),
        size_bytes: manifest.size_bytes,
        size_mb: size_mb(manifest.size_bytes),
        deletion_result,
    }
}

fn audit_protected(protected: &ProtectedManifest, policy: &AgePolicy) -> AuditProtectedManifest {
    let manifest = &protected.manifest;
    let age_days = policy.age_days(manifest);
    let used_by: Vec<String> = protected
        .referenced_by
        .iter()
        .map(ToString::to_string)
        .collect();

    AuditProtectedManifest {
        repository: manifest.repository.clone(),
        digest: manifest.digest.to_string(),
        tags: manifest.tags.iter().cloned().collect(),
        created_time: manifest.created_time.map(|t| t.to_rfc3339()),
        age_days,
        days_over_threshold: policy.days_over_threshold(manifest),
        size_bytes: manifest.size_bytes,
        size_mb: size_mb(manifest.size_bytes),
        app_service_count: used_by.len(),
        used_by_app_services: used_by,
        status: PROTECTED_STATUS,
        warning: format!(
            "This manifest is {} days old, exceeding the {}-day threshold",
            age_days.unwrap_or_default(),
            policy.threshold_days()
        ),
    }
}

/// Assemble the audit document for a clean run.
pub fn build_audit(
    run: RunInfo<'_>,
    reconciliation: &Reconciliation,
    ledger: Option<&DeletionLedger>,
) -> AuditLog {
    let policy = &reconciliation.policy;
    let classification = &reconciliation.classification;
    let duration_seconds =
        (run.finished_at - run.started_at).num_milliseconds() as f64 / 1000.0;

    let mut unused = classification.unused_eligible.clone();
    oldest_first(&mut unused, |m| m.created_time);
    let manifests = unused
        .iter()
        .map(|m| audit_manifest(m, policy, ledger))
        .collect();

    let mut protected = classification.old_but_referenced.clone();
    oldest_first(&mut protected, |p| p.manifest.created_time);
    let old_manifests_in_use = protected
        .iter()
        .map(|p| audit_protected(p, policy))
        .collect();

    let hard_results = ledger.filter(|l| run.mode == DeletionMode::Hard && l.attempted() > 0);
    let deletion_summary = hard_results.map(|l| DeletionSummary {
        total_attempted: l.attempted(),
        successful: l.successful(),
        failed: l.failed(),
        success_rate: round2(l.success_rate()),
    });
    let failed_deletions = hard_results.filter(|l| l.failed() > 0).map(|l| {
        l.failures()
            .map(|o| FailedDeletion {
                digest: o.digest.to_string(),
                error: o.error().unwrap_or_default().to_string(),
            })
            .collect()
    });

    AuditLog {
        started_at: run.started_at,
        audit_metadata: AuditMetadata {
            audit_file_version: AUDIT_FILE_VERSION,
            script_version: env!("CARGO_PKG_VERSION"),
            generated_at: Utc::now().to_rfc3339(),
        },
        execution_info: ExecutionInfo {
            deletion_mode: run.mode,
            start_time: run.started_at.to_rfc3339(),
            end_time: run.finished_at.to_rfc3339(),
            duration_seconds: round2(duration_seconds),
            duration_human: duration_human(duration_seconds),
            executed_by: run.system.user.clone(),
        },
        configuration: AuditConfiguration {
            subscription_id: run.config.subscription.clone(),
            acr_name: run.config.registry.to_string(),
            acr_resource_group: run.config.resource_group.clone(),
            image_age_threshold_days: policy.threshold_days(),
        },
        system_info: run.system,
        summary: AuditSummary {
            total_manifests_scanned: reconciliation.total_manifests,
            manifests_older_than_threshold: reconciliation.old.manifest_count(),
            images_in_use: reconciliation.images_in_use.len(),
            unused_manifests_identified: classification.unused_eligible.len(),
            old_manifests_still_in_use: classification.old_but_referenced.len(),
            old_manifests_still_in_use_warning: (!classification.old_but_referenced.is_empty())
                .then_some(PROTECTED_WARNING),
        },
        manifests,
        old_manifests_in_use,
        deletion_summary,
        failed_deletions,
    }
}

/// `<YYYYmmdd_HHMMSS>_<mode>_<registry>_<n>_manifests.json`
pub fn audit_filename(
    started_at: DateTime<Utc>,
    mode: DeletionMode,
    registry: &str,
    manifest_count: usize,
) -> String {
    format!(
        "{}_{mode}_{registry}_{manifest_count}_manifests.json",
        started_at.format("%Y%m%d_%H%M%S")
    )
}

/// Write `audit` as pretty JSON under `dir`, creating it if needed.
pub fn write_audit(dir: &Path, audit: &AuditLog) -> Result<PathBuf, AuditError> {
    std::fs::create_dir_all(dir).map_err(|source| AuditError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(audit_filename(
        audit.started_at,
        audit.execution_info.deletion_mode,
        &audit.configuration.acr_name,
        audit.manifests.len(),
    ));

    let json = serde_json::to_string_pretty(audit)?;
    std::fs::write(&path, json).map_err(|source| AuditError::Write {
        path: path.clone(),
        source,
    })?;

    tracing::info!(path = %path.display(), "audit written");
    Ok(path)
}
