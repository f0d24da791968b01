// ABOUTME: Command module aggregator for the acr-sweep CLI.
// ABOUTME: Re-exports init, scan and clean handlers and the shared engine runner.

mod clean;
mod init;
mod scan;

pub use clean::clean;
pub use init::init;
pub use scan::scan;

use acr_sweep::az::{AcrRegistry, AppServiceInventory, AzCli};
use acr_sweep::config::RunConfig;
use acr_sweep::diagnostics::Diagnostics;
use acr_sweep::error::Result;
use acr_sweep::output::Output;
use acr_sweep::reconcile::{Reconciliation, reconcile};
use acr_sweep::report;
use chrono::Utc;

/// Collaborators backed by the Azure CLI.
pub struct Azure {
    pub az: AzCli,
    pub registry: AcrRegistry,
    pub workloads: AppServiceInventory,
}

impl Azure {
    pub fn new(config: &RunConfig) -> Self {
        let az = AzCli::new(&config.az_command)
            .subscription(&config.subscription)
            .command_timeout(config.command_timeout);
        let registry = AcrRegistry::new(az.clone(), config.registry.clone());
        let workloads = AppServiceInventory::new(az.clone());
        Self {
            az,
            registry,
            workloads,
        }
    }
}

/// Run the engine and print its report.
pub async fn analyze(
    azure: &Azure,
    config: &RunConfig,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<Reconciliation> {
    output.progress(&format!(
        "Scanning registry '{}' for manifests older than {} days...",
        config.registry, config.threshold_days
    ));

    let reconciliation = reconcile(
        &azure.registry,
        &azure.workloads,
        &config.engine_settings(),
        Utc::now(),
        diag,
    )
    .await?;

    output.progress(&format!(
        "Catalogued {} manifest(s), {} older than the threshold",
        reconciliation.total_manifests,
        reconciliation.old.manifest_count()
    ));

    if !reconciliation.nothing_old() {
        let policy = &reconciliation.policy;
        output.block(&report::unused_summary(
            &reconciliation.classification,
            policy,
        ));
        output.block(&report::protected_warning(
            &reconciliation.classification,
            &reconciliation.summary,
            policy,
        ));
        output.data("summary", &reconciliation.summary);
    }

    Ok(reconciliation)
}

/// Surface collected diagnostics to the user.
pub fn emit_warnings(diag: &Diagnostics, output: &Output) {
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
}
