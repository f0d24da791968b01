// ABOUTME: Clean command implementation.
// ABOUTME: Reports, selects a deletion mode, deletes (or lists) unused manifests and writes the audit.

use std::time::Duration;

use acr_sweep::audit::{RunInfo, SystemInfo, build_audit, write_audit};
use acr_sweep::az::AcrRegistry;
use acr_sweep::config::RunConfig;
use acr_sweep::diagnostics::{Diagnostics, Warning};
use acr_sweep::error::{Error, Result};
use acr_sweep::output::Output;
use acr_sweep::prompt::{self, Prompter};
use acr_sweep::reconcile::{
    CancelFlag, DeletionEvent, DeletionLedger, DeletionMode, ManifestRecord, delete_manifests,
};
use chrono::Utc;
use serde::Serialize;

use super::{Azure, analyze, emit_warnings};

#[derive(Serialize)]
struct PlannedDeletion<'a> {
    repository: &'a str,
    digest: String,
    tags: String,
    command: String,
}

pub async fn clean(
    config: RunConfig,
    mode: Option<DeletionMode>,
    yes: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let started_at = Utc::now();
    let azure = Azure::new(&config);
    let mut diag = Diagnostics::default();

    let reconciliation = analyze(&azure, &config, &output, &mut diag).await?;

    if reconciliation.nothing_old() {
        emit_warnings(&diag, &output);
        output.success(&format!(
            "No manifests older than {} days, nothing to clean",
            config.threshold_days
        ));
        return Ok(());
    }

    let plan = reconciliation.deletion_plan();
    if plan.is_empty() {
        emit_warnings(&diag, &output);
        output.success("No unused manifests to delete");
        return Ok(());
    }

    let mode = match mode {
        Some(mode) => mode,
        None => prompt::blocking(|| Prompter::terminal().select_mode()).await?,
    };
    tracing::info!(%mode, manifests = plan.len(), "deletion mode selected");

    // Held until the audit is on disk so an interrupt is never swallowed.
    let mut interrupts = None;
    let (ledger, result) = match mode {
        DeletionMode::Mock => {
            mock_delete(&azure.registry, &plan, &output);
            (
                None,
                format!(
                    "Mock deletion complete: {} manifest(s) would be deleted",
                    plan.len()
                ),
            )
        }
        DeletionMode::Hard => {
            let count = plan.len();
            let confirmed = yes
                || prompt::blocking(move || Prompter::terminal().confirm_hard_delete(count))
                    .await?;
            if confirmed {
                let watch = interrupts.insert(InterruptWatch::install());
                let ledger = hard_delete(
                    &azure.registry,
                    &plan,
                    config.deletion_timeout,
                    watch.cancel_flag(),
                    &output,
                )
                .await;
                let summary = deletion_summary(&ledger);
                (Some(ledger), summary)
            } else {
                (None, "Deletion cancelled, no images were deleted".to_string())
            }
        }
    };

    let run = RunInfo {
        mode,
        config: &config,
        started_at,
        finished_at: Utc::now(),
        system: SystemInfo::collect(&azure.az).await,
    };
    let audit = build_audit(run, &reconciliation, ledger.as_ref());
    match write_audit(&config.audit_dir, &audit) {
        Ok(path) => output.progress(&format!("Audit log written to: {}", path.display())),
        Err(e) => diag.warn(Warning::audit_write(format!(
            "failed to write audit log: {e}"
        ))),
    }

    emit_warnings(&diag, &output);
    if interrupts.is_some_and(|watch| watch.interrupted()) {
        output.warning(&result);
        return Err(Error::Interrupted);
    }
    output.success(&result);
    Ok(())
}

/// Turns Ctrl-C into a cancel request while alive. A second Ctrl-C exits at once.
struct InterruptWatch {
    cancel: CancelFlag,
    task: tokio::task::JoinHandle<()>,
}

impl InterruptWatch {
    fn install() -> Self {
        let cancel = CancelFlag::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                tracing::warn!("interrupt received, stopping after the current deletion");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("second interrupt received, exiting");
                    std::process::exit(130);
                }
            }
        });
        Self { cancel, task }
    }

    fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    fn interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for InterruptWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// List the commands a hard deletion would run.
fn mock_delete(registry: &AcrRegistry, plan: &[ManifestRecord], output: &Output) {
    output.progress("MOCK DELETION (no images are deleted). These commands would run:");
    let total = plan.len();

    let planned: Vec<PlannedDeletion<'_>> = plan
        .iter()
        .map(|m| PlannedDeletion {
            repository: &m.repository,
            digest: m.digest.to_string(),
            tags: m.tags_display(),
            command: registry.delete_command(&m.repository, &m.digest),
        })
        .collect();

    for (i, (m, p)) in plan.iter().zip(&planned).enumerate() {
        output.progress(&format!("[{}/{total}] {}", i + 1, p.command));
        output.progress(&format!(
            "         (would delete {}@{} with tags: {})",
            m.repository,
            m.digest.short(),
            p.tags
        ));
    }
    output.data("mock_deletion", &planned);
}

/// Delete sequentially, stopping between manifests once `cancel` trips.
async fn hard_delete(
    registry: &AcrRegistry,
    plan: &[ManifestRecord],
    deletion_timeout: Duration,
    cancel: &CancelFlag,
    output: &Output,
) -> DeletionLedger {
    let ledger = delete_manifests(
        registry,
        plan,
        deletion_timeout,
        cancel,
        |event| match event {
            DeletionEvent::Starting {
                position,
                total,
                manifest,
            } => output.progress(&format!(
                "[{position}/{total}] Deleting {}@{} (tags: {})",
                manifest.repository,
                manifest.digest.short(),
                manifest.tags_display()
            )),
            DeletionEvent::Finished { outcome, .. } => match outcome.error() {
                None => output.progress("  deleted"),
                Some(error) => output.warning(&format!(
                    "failed to delete {}@{}: {error}",
                    outcome.repository,
                    outcome.digest.short()
                )),
            },
        },
    )
    .await;

    if ledger.was_cancelled() {
        output.warning(&format!(
            "deletion cancelled, {} manifest(s) were not attempted",
            ledger.planned() - ledger.attempted()
        ));
    }
    ledger
}

fn deletion_summary(ledger: &DeletionLedger) -> String {
    format!(
        "Deleted {} of {} manifest(s), {} failed ({:.2}% success)",
        ledger.successful(),
        ledger.attempted(),
        ledger.failed(),
        ledger.success_rate()
    )
}
