// ABOUTME: Workload inventory collaborator trait and configuration snapshot types.
// ABOUTME: Models container descriptors as a tagged variant decided once per snapshot.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Application setting naming a custom container image.
pub const CUSTOM_IMAGE_SETTING: &str = "DOCKER_CUSTOM_IMAGE_NAME";

/// Prefix of a container launch descriptor, e.g. `DOCKER|repo:tag`.
pub const DOCKER_DESCRIPTOR_PREFIX: &str = "DOCKER|";

/// Read access to the running workloads that may reference registry images.
#[async_trait]
pub trait WorkloadOps: Send + Sync {
    /// List every workload instance visible in the current scope.
    async fn list_instances(&self) -> Result<Vec<InstanceDescriptor>, WorkloadError>;

    /// Read an instance's active configuration.
    async fn active_config(
        &self,
        instance: &InstanceDescriptor,
    ) -> Result<ConfigSnapshot, WorkloadError>;

    /// List the names of an instance's secondary deployment environments.
    async fn list_environments(
        &self,
        instance: &InstanceDescriptor,
    ) -> Result<Vec<String>, WorkloadError>;

    /// Read the configuration of one secondary deployment environment.
    async fn environment_config(
        &self,
        instance: &InstanceDescriptor,
        environment: &str,
    ) -> Result<ConfigSnapshot, WorkloadError>;
}

/// A workload instance as enumerated by the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescriptor {
    pub name: String,
    pub resource_group: String,
}

impl InstanceDescriptor {
    pub fn new(name: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_group: resource_group.into(),
        }
    }
}

/// Container launch descriptor of a configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContainerDescriptor {
    Linux(String),
    Windows(String),
    #[default]
    Unrecognized,
}

impl ContainerDescriptor {
    /// Pick the descriptor form. A non-empty Linux value takes precedence.
    pub fn from_fx_versions(linux: Option<&str>, windows: Option<&str>) -> Self {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        if let Some(linux) = non_empty(linux) {
            Self::Linux(linux.to_string())
        } else if let Some(windows) = non_empty(windows) {
            Self::Windows(windows.to_string())
        } else {
            Self::Unrecognized
        }
    }

    /// The image named by a `DOCKER|<image>` descriptor.
    pub fn docker_image(&self) -> Option<&str> {
        match self {
            Self::Linux(fx) | Self::Windows(fx) => fx
                .strip_prefix(DOCKER_DESCRIPTOR_PREFIX)
                .map(str::trim)
                .filter(|image| !image.is_empty()),
            Self::Unrecognized => None,
        }
    }
}

/// Configuration of one workload instance or deployment environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub container: ContainerDescriptor,
    pub app_settings: HashMap<String, String>,
}

impl ConfigSnapshot {
    /// The declared image: launch descriptor first, then the custom image setting.
    pub fn declared_image(&self) -> Option<&str> {
        self.container.docker_image().or_else(|| {
            self.app_settings
                .get(CUSTOM_IMAGE_SETTING)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
        })
    }
}

/// Errors from workload inventory operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("workload not found: {0}")]
    NotFound(String),

    #[error("inventory command failed: {0}")]
    CommandFailed(String),

    #[error("inventory call timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed inventory response: {0}")]
    Malformed(String),
}
