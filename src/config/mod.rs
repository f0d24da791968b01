// ABOUTME: Configuration types and parsing for acr-sweep.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and resolution into a RunConfig.

mod deserialize;
mod env_value;
mod init;

pub use env_value::{EnvValue, resolve_optional};
pub use init::init_config;

use crate::error::{Error, Result};
use crate::reconcile::EngineSettings;
use crate::types::RegistryName;
use deserialize::{deserialize_concurrency, deserialize_program};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "acr-sweep.yml";
pub const CONFIG_FILENAME_ALT: &str = "acr-sweep.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".acr-sweep/config.yml";

pub const DEFAULT_THRESHOLD_DAYS: u32 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub registry: Option<EnvValue>,

    /// Overrides `<registry>.azurecr.io`.
    #[serde(default)]
    pub login_server: Option<EnvValue>,

    #[serde(default)]
    pub subscription: Option<EnvValue>,

    #[serde(default)]
    pub resource_group: Option<EnvValue>,

    #[serde(default = "default_threshold_days")]
    pub threshold_days: u32,

    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,

    #[serde(default = "default_az_command", deserialize_with = "deserialize_program")]
    pub az_command: String,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    #[serde(default = "default_deletion_timeout", with = "humantime_serde")]
    pub deletion_timeout: Duration,

    #[serde(default = "default_concurrency", deserialize_with = "deserialize_concurrency")]
    pub concurrency: usize,
}

fn default_threshold_days() -> u32 {
    DEFAULT_THRESHOLD_DAYS
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from("audits")
}

fn default_az_command() -> String {
    "az".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_deletion_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_concurrency() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Config {
            registry: None,
            login_server: None,
            subscription: None,
            resource_group: None,
            threshold_days: default_threshold_days(),
            audit_dir: default_audit_dir(),
            az_command: default_az_command(),
            command_timeout: default_command_timeout(),
            deletion_timeout: default_deletion_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

/// Values supplied on the command line (or their environment fallbacks).
/// Each one wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub registry: Option<String>,
    pub subscription: Option<String>,
    pub resource_group: Option<String>,
    pub threshold_days: Option<u32>,
}

/// Fully resolved, immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub registry: RegistryName,
    pub login_server: String,
    pub subscription: String,
    pub resource_group: String,
    pub threshold_days: u32,
    pub audit_dir: PathBuf,
    pub az_command: String,
    pub command_timeout: Duration,
    pub deletion_timeout: Duration,
    pub concurrency: usize,
}

impl RunConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            login_server: self.login_server.clone(),
            threshold_days: self.threshold_days,
            concurrency: self.concurrency,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Load `explicit` if given, else discover in `dir`, else fall back to
    /// defaults so flags and environment alone can drive a run.
    pub fn locate(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => match Self::discover(dir) {
                Err(Error::ConfigNotFound(_)) => {
                    tracing::debug!("no configuration file found, using defaults");
                    Ok(Self::default())
                }
                other => other,
            },
        }
    }

    /// Merge `overrides`, interpolate env references and validate.
    pub fn resolve(&self, overrides: &Overrides) -> Result<RunConfig> {
        let registry = pick(overrides.registry.as_deref(), self.registry.as_ref())?.ok_or(
            Error::MissingSetting {
                name: "registry",
                flag: "registry",
            },
        )?;
        let registry =
            RegistryName::new(&registry).map_err(|e| Error::InvalidConfig(e.to_string()))?;

        let subscription = pick(overrides.subscription.as_deref(), self.subscription.as_ref())?
            .ok_or(Error::MissingSetting {
                name: "subscription",
                flag: "subscription",
            })?;

        let resource_group =
            pick(overrides.resource_group.as_deref(), self.resource_group.as_ref())?.ok_or(
                Error::MissingSetting {
                    name: "resource_group",
                    flag: "resource-group",
                },
            )?;

        let login_server = resolve_optional(self.login_server.as_ref())?
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| registry.login_server());

        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        Ok(RunConfig {
            registry,
            login_server,
            subscription,
            resource_group,
            threshold_days: overrides.threshold_days.unwrap_or(self.threshold_days),
            audit_dir: self.audit_dir.clone(),
            az_command: self.az_command.clone(),
            command_timeout: self.command_timeout,
            deletion_timeout: self.deletion_timeout,
            concurrency: self.concurrency,
        })
    }
}

fn pick(flag: Option<&str>, file: Option<&EnvValue>) -> Result<Option<String>> {
    match flag.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => Ok(Some(value.to_string())),
        None => resolve_optional(file),
    }
}
