// ABOUTME: Workload inventory collaborator over `az webapp`.
// ABOUTME: Reads App Service site configs, app settings and deployment slots.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::AzCli;
use crate::workload::{
    ConfigSnapshot, ContainerDescriptor, InstanceDescriptor, WorkloadError, WorkloadOps,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Site {
    name: String,
    #[serde(default)]
    resource_group: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteConfig {
    #[serde(default)]
    linux_fx_version: Option<String>,
    #[serde(default)]
    windows_fx_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppSetting {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Slot {
    name: String,
}

/// Slot names are reported as `app/slot`; keep the last segment.
fn slot_name(reported: &str) -> &str {
    reported.rsplit('/').next().unwrap_or(reported)
}

/// Azure App Service web apps in the CLI's current subscription.
#[derive(Debug, Clone)]
pub struct AppServiceInventory {
    az: AzCli,
}

impl AppServiceInventory {
    pub fn new(az: AzCli) -> Self {
        Self { az }
    }

    async fn snapshot(
        &self,
        instance: &InstanceDescriptor,
        slot: Option<&str>,
    ) -> Result<ConfigSnapshot, WorkloadError> {
        let mut scope = vec![
            "--name",
            instance.name.as_str(),
            "--resource-group",
            instance.resource_group.as_str(),
        ];
        if let Some(slot) = slot {
            scope.extend(["--slot", slot]);
        }

        let config_args: Vec<&str> = ["webapp", "config", "show"]
            .into_iter()
            .chain(scope.iter().copied())
            .collect();
        let config: SiteConfig = self.az.json(&config_args).await?;

        let settings_args: Vec<&str> = ["webapp", "config", "appsettings", "list"]
            .into_iter()
            .chain(scope.iter().copied())
            .collect();
        let settings: Vec<AppSetting> = self.az.json(&settings_args).await?;

        Ok(ConfigSnapshot {
            container: ContainerDescriptor::from_fx_versions(
                config.linux_fx_version.as_deref(),
                config.windows_fx_version.as_deref(),
            ),
            app_settings: settings_map(settings),
        })
    }
}

fn settings_map(settings: Vec<AppSetting>) -> HashMap<String, String> {
    settings
        .into_iter()
        .filter_map(|s| s.value.map(|value| (s.name, value)))
        .collect()
}

#[async_trait]
impl WorkloadOps for AppServiceInventory {
    async fn list_instances(&self) -> Result<Vec<InstanceDescriptor>, WorkloadError> {
        let sites: Vec<Site> = self.az.json(&["webapp", "list"]).await?;
        Ok(sites
            .into_iter()
            .map(|site| InstanceDescriptor::new(site.name, site.resource_group))
            .collect())
    }

    async fn active_config(
        &self,
        instance: &InstanceDescriptor,
    ) -> Result<ConfigSnapshot, WorkloadError> {
        self.snapshot(instance, None).await
    }

    async fn list_environments(
        &self,
        instance: &InstanceDescriptor,
    ) -> Result<Vec<String>, WorkloadError> {
        let slots: Vec<Slot> = self
            .az
            .json(&[
                "webapp",
                "deployment",
                "slot",
                "list",
                "--name",
                &instance.name,
                "--resource-group",
                &instance.resource_group,
            ])
            .await?;
        Ok(slots
            .iter()
            .map(|slot| slot_name(&slot.name).to_string())
            .collect())
    }

    async fn environment_config(
        &self,
        instance: &InstanceDescriptor,
        environment: &str,
    ) -> Result<ConfigSnapshot, WorkloadError> {
        self.snapshot(instance, Some(environment)).await
    }
}
