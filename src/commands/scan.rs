// ABOUTME: Scan command implementation.
// ABOUTME: Runs the engine read-only and reports what a clean would remove.

use acr_sweep::config::RunConfig;
use acr_sweep::diagnostics::Diagnostics;
use acr_sweep::error::Result;
use acr_sweep::output::Output;
use acr_sweep::report::format_size;

use super::{Azure, analyze, emit_warnings};

pub async fn scan(config: RunConfig, mut output: Output) -> Result<()> {
    output.start_timer();
    let azure = Azure::new(&config);
    let mut diag = Diagnostics::default();

    let reconciliation = analyze(&azure, &config, &output, &mut diag).await?;
    emit_warnings(&diag, &output);

    if reconciliation.nothing_old() {
        output.success(&format!(
            "No manifests older than {} days",
            config.threshold_days
        ));
        return Ok(());
    }

    let summary = &reconciliation.summary;
    let protected = summary.protected.as_ref().map_or(0, |p| p.count);
    output.success(&format!(
        "{} unused manifest(s), {} reclaimable; {} old manifest(s) still in use",
        summary.candidate_count,
        format_size(summary.reclaimable_bytes),
        protected
    ));
    Ok(())
}
