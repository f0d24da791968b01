// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates acr-sweep.yml template files.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::RegistryName;

use super::{CONFIG_FILENAME, DEFAULT_THRESHOLD_DAYS};

/// Write a template config into `dir`, returning its path.
pub fn init_config(dir: &Path, registry: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let registry = match registry {
        Some(name) => {
            let name = RegistryName::new(name).map_err(|e| Error::InvalidConfig(e.to_string()))?;
            format!("registry: {name}")
        }
        None => "registry:\n  env: AZURE_ACR_NAME".to_string(),
    };

    std::fs::write(&config_path, generate_template_yaml(&registry))?;
    Ok(config_path)
}

fn generate_template_yaml(registry: &str) -> String {
    format!(
        r#"{registry}
subscription:
  env: AZURE_SUBSCRIPTION_ID
resource_group:
  env: AZURE_ACR_RESOURCE_GROUP

# Manifests created more than this many days ago are considered old
threshold_days: {DEFAULT_THRESHOLD_DAYS}

# Where clean runs write their JSON audit files
audit_dir: audits

# az_command: az
# command_timeout: 5m
# deletion_timeout: 60s
# concurrency: 4
"#
    )
}
