// ABOUTME: Sequential deletion of unused manifests with a per-digest ledger.
// ABOUTME: Each call is time-bounded; failures never stop the batch; cancellation is honored between calls.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use nonempty::NonEmpty;
use serde::Serialize;

use super::catalog::ManifestRecord;
use crate::registry::RegistryOps;
use crate::types::Digest;

/// How unused manifests are handled once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionMode {
    /// List what would be deleted; change nothing.
    Mock,
    /// Permanently delete from the registry.
    Hard,
}

impl fmt::Display for DeletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionMode::Mock => write!(f, "mock"),
            DeletionMode::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for DeletionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(DeletionMode::Mock),
            "hard" => Ok(DeletionMode::Hard),
            other => Err(format!(
                "unknown deletion mode '{other}' (expected 'mock' or 'hard')"
            )),
        }
    }
}

/// Shared cancellation signal, checked between deletions.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionStatus {
    Succeeded,
    Failed(String),
}

/// Result of one deletion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub repository: String,
    pub digest: Digest,
    pub tags: NonEmpty<String>,
    pub status: DeletionStatus,
    pub timestamp: DateTime<Utc>,
}

impl DeletionOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == DeletionStatus::Succeeded
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            DeletionStatus::Succeeded => None,
            DeletionStatus::Failed(error) => Some(error),
        }
    }
}

/// Per-digest results of a deletion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionLedger {
    outcomes: Vec<DeletionOutcome>,
    planned: usize,
    cancelled: bool,
}

impl DeletionLedger {
    /// The outcome for one manifest. A digest may live in several repositories.
    pub fn outcome_for(&self, repository: &str, digest: &Digest) -> Option<&DeletionOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.repository == repository && &o.digest == digest)
    }

    /// Number of manifests the run was asked to delete.
    pub fn planned(&self) -> usize {
        self.planned
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.successful()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    /// Percentage of attempted deletions that succeeded, 0 when none ran.
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.successful() as f64 / self.attempted() as f64 * 100.0
        }
    }

    /// Whether the run stopped early on user cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Progress events emitted while deleting.
#[derive(Debug)]
pub enum DeletionEvent<'a> {
    Starting {
        position: usize,
        total: usize,
        manifest: &'a ManifestRecord,
    },
    Finished {
        position: usize,
        total: usize,
        outcome: &'a DeletionOutcome,
    },
}

/// Delete `manifests` one at a time.
///
/// Each registry call is bounded by `timeout`. A failed or timed-out
/// deletion is recorded and the next one proceeds. `cancel` is checked
/// before every call; an in-flight call is always allowed to finish.
pub async fn delete_manifests<R, F>(
    registry: &R,
    manifests: &[ManifestRecord],
    timeout: Duration,
    cancel: &CancelFlag,
    mut on_event: F,
) -> DeletionLedger
where
    R: RegistryOps + ?Sized,
    F: FnMut(DeletionEvent<'_>),
{
    let total = manifests.len();
    let mut ledger = DeletionLedger {
        outcomes: Vec::with_capacity(total),
        planned: total,
        cancelled: false,
    };

    for (index, manifest) in manifests.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::warn!(
                remaining = total - index,
                "deletion cancelled, remaining manifests left untouched"
            );
            ledger.cancelled = true;
            break;
        }

        let position = index + 1;
        on_event(DeletionEvent::Starting {
            position,
            total,
            manifest,
        });

        let call = registry.delete_manifest(&manifest.repository, &manifest.digest);
        let status = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(())) => {
                tracing::info!(
                    repository = %manifest.repository,
                    digest = %manifest.digest,
                    "deleted manifest"
                );
                DeletionStatus::Succeeded
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    repository = %manifest.repository,
                    digest = %manifest.digest,
                    "deletion failed: {e}"
                );
                DeletionStatus::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    repository = %manifest.repository,
                    digest = %manifest.digest,
                    "deletion timed out"
                );
                DeletionStatus::Failed(format!(
                    "deletion timed out after {} seconds",
                    timeout.as_secs_f64()
                ))
            }
        };

        ledger.outcomes.push(DeletionOutcome {
            repository: manifest.repository.clone(),
            digest: manifest.digest.clone(),
            tags: manifest.tags.clone(),
            status,
            timestamp: Utc::now(),
        });

        if let Some(outcome) = ledger.outcomes.last() {
            on_event(DeletionEvent::Finished {
                position,
                total,
                outcome,
            });
        }
    }

    ledger
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("MOCK".parse::<DeletionMode>(), Ok(DeletionMode::Mock));
        assert_eq!(" hard ".parse::<DeletionMode>(), Ok(DeletionMode::Hard));
        assert!("soft".parse::<DeletionMode>().is_err());
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn empty_ledger_rates() {
        let ledger = DeletionLedger::default();
        assert_eq!(ledger.success_rate(), 0.0);
        assert_eq!(ledger.failed(), 0);
        assert!(!ledger.was_cancelled());
    }
}
