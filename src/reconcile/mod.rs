// ABOUTME: Unused-image reconciliation engine.
// ABOUTME: Catalog, age filter, usage extraction, resolution, classification and deletion.

pub mod age;
pub mod catalog;
pub mod classify;
pub mod delete;
pub mod metrics;
pub mod resolve;
pub mod usage;

pub use age::{AgePolicy, filter_old};
pub use catalog::{Catalog, ManifestRecord, UNTAGGED, build_catalog, parse_created_time};
pub use classify::{Classification, ProtectedManifest, classify};
pub use delete::{
    CancelFlag, DeletionEvent, DeletionLedger, DeletionMode, DeletionOutcome, DeletionStatus,
    delete_manifests,
};
pub use metrics::{ProtectedSummary, Summary, summarize};
pub use resolve::{UsageIndex, UsageIndexBuilder, resolve_references};
pub use usage::{ImageUsage, collect_usage, registry_image};

use chrono::{DateTime, Utc};
use snafu::{ResultExt, Snafu};

use crate::diagnostics::Diagnostics;
use crate::registry::{RegistryError, RegistryOps};
use crate::workload::{WorkloadError, WorkloadOps};

/// Fatal pipeline failures. Everything else is a diagnostic.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReconcileError {
    #[snafu(display("failed to build manifest catalog: {source}"))]
    Catalog { source: RegistryError },

    #[snafu(display("failed to enumerate workloads: {source}"))]
    Workloads { source: WorkloadError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileErrorKind {
    /// A registry call did not complete in time.
    Timeout,
    /// The collaborator returned data that could not be decoded.
    MalformedResponse,
    /// The collaborator command failed or the target was missing.
    Unavailable,
}

impl ReconcileError {
    pub fn kind(&self) -> ReconcileErrorKind {
        match self {
            ReconcileError::Catalog { source } => match source {
                RegistryError::Timeout(_) => ReconcileErrorKind::Timeout,
                RegistryError::Malformed(_) => ReconcileErrorKind::MalformedResponse,
                RegistryError::NotFound(_) | RegistryError::CommandFailed(_) => {
                    ReconcileErrorKind::Unavailable
                }
            },
            ReconcileError::Workloads { source } => match source {
                WorkloadError::Timeout(_) => ReconcileErrorKind::Timeout,
                WorkloadError::Malformed(_) => ReconcileErrorKind::MalformedResponse,
                WorkloadError::NotFound(_) | WorkloadError::CommandFailed(_) => {
                    ReconcileErrorKind::Unavailable
                }
            },
        }
    }
}

/// Engine inputs resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub login_server: String,
    pub threshold_days: u32,
    pub concurrency: usize,
}

/// Everything one run of the engine produced.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub total_manifests: usize,
    pub policy: AgePolicy,
    pub old: Catalog,
    pub images_in_use: ImageUsage,
    pub usage_index: UsageIndex,
    pub classification: Classification,
    pub summary: Summary,
}

impl Reconciliation {
    /// Whether the run found nothing old enough to act on.
    pub fn nothing_old(&self) -> bool {
        self.old.is_empty()
    }

    /// The deletion plan: unused manifests, oldest first.
    pub fn deletion_plan(&self) -> Vec<ManifestRecord> {
        let mut plan = self.classification.unused_eligible.clone();
        plan.sort_by_key(|m| m.created_time);
        plan
    }
}

/// Run the engine end to end. Never deletes anything.
///
/// When no manifest is past the threshold the workload scan is skipped
/// and the classification is empty.
pub async fn reconcile<R, W>(
    registry: &R,
    workloads: &W,
    settings: &EngineSettings,
    now: DateTime<Utc>,
    diag: &mut Diagnostics,
) -> Result<Reconciliation, ReconcileError>
where
    R: RegistryOps + ?Sized,
    W: WorkloadOps + ?Sized,
{
    let policy = AgePolicy::new(settings.threshold_days, now);

    let catalog = build_catalog(registry, settings.concurrency, diag)
        .await
        .context(CatalogSnafu)?;
    let old = filter_old(&catalog, &policy, diag);

    if old.is_empty() {
        tracing::info!("no manifests older than threshold, skipping workload scan");
        let classification = Classification::default();
        let summary = summarize(&classification, &policy);
        return Ok(Reconciliation {
            total_manifests: catalog.manifest_count(),
            policy,
            old,
            images_in_use: ImageUsage::new(),
            usage_index: UsageIndex::default(),
            classification,
            summary,
        });
    }

    let images_in_use = collect_usage(
        workloads,
        &settings.login_server,
        settings.concurrency,
        diag,
    )
    .await
    .context(WorkloadsSnafu)?;

    let usage_index = resolve_references(
        &images_in_use,
        &settings.login_server,
        registry,
        settings.concurrency,
        diag,
    )
    .await;

    let classification = classify(&old, &usage_index);
    let summary = summarize(&classification, &policy);

    Ok(Reconciliation {
        total_manifests: catalog.manifest_count(),
        policy,
        old,
        images_in_use,
        usage_index,
        classification,
        summary,
    })
}
