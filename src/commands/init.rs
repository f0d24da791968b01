// ABOUTME: Init command implementation.
// ABOUTME: Writes a template acr-sweep.yml into the working directory.

use std::path::Path;

use acr_sweep::config;
use acr_sweep::error::Result;
use acr_sweep::output::Output;

pub fn init(dir: &Path, registry: Option<&str>, force: bool, output: Output) -> Result<()> {
    let path = config::init_config(dir, registry, force)?;
    output.success(&format!("Created {}", path.display()));
    Ok(())
}
