// ABOUTME: Test support utilities.
// ABOUTME: In-memory registry and workload inventory fakes for engine tests.

// Each test binary only uses some of these helpers, so allow dead_code.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Once;
use std::time::Duration;

use acr_sweep::reconcile::CancelFlag;
use acr_sweep::registry::{RawManifest, RegistryError, RegistryOps};
use acr_sweep::types::Digest;
use acr_sweep::workload::{
    ConfigSnapshot, ContainerDescriptor, InstanceDescriptor, WorkloadError, WorkloadOps,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub const LOGIN_SERVER: &str = "myregistry.azurecr.io";

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("acr_sweep=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A creation timestamp `days` days (plus an hour) before `now`.
pub fn days_ago(now: DateTime<Utc>, days: i64) -> String {
    (now - chrono::Duration::days(days) - chrono::Duration::hours(1)).to_rfc3339()
}

pub fn raw(digest: &str, tags: &[&str], created: Option<String>) -> RawManifest {
    RawManifest {
        digest: digest.to_string(),
        tags: Some(tags.iter().map(|t| t.to_string()).collect()),
        created_time: created,
        size_bytes: 1024 * 1024,
    }
}

pub fn digest(value: &str) -> Digest {
    Digest::parse(value).unwrap()
}

/// Registry fake. Listing order follows insertion order.
#[derive(Default)]
pub struct FakeRegistry {
    repositories: Vec<String>,
    manifests: HashMap<String, Vec<RawManifest>>,
    tags: HashMap<(String, String), Digest>,
    failing_listing: Option<String>,
    failing_deletes: HashSet<Digest>,
    failing_repository_deletes: HashSet<(String, Digest)>,
    hanging_deletes: HashSet<Digest>,
    cancel_on_delete: Option<CancelFlag>,
    pub resolved: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<(String, Digest)>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest(mut self, repository: &str, manifest: RawManifest) -> Self {
        if !self.manifests.contains_key(repository) {
            self.repositories.push(repository.to_string());
        }
        self.manifests
            .entry(repository.to_string())
            .or_default()
            .push(manifest);
        self
    }

    pub fn empty_repository(mut self, repository: &str) -> Self {
        self.repositories.push(repository.to_string());
        self.manifests.entry(repository.to_string()).or_default();
        self
    }

    pub fn tag(mut self, repository: &str, tag: &str, target: &str) -> Self {
        self.tags
            .insert((repository.to_string(), tag.to_string()), digest(target));
        self
    }

    pub fn failing_listing(mut self, repository: &str) -> Self {
        self.failing_listing = Some(repository.to_string());
        self
    }

    pub fn failing_delete(mut self, target: &str) -> Self {
        self.failing_deletes.insert(digest(target));
        self
    }

    /// Fail deleting `target` in `repository` only.
    pub fn failing_delete_in(mut self, repository: &str, target: &str) -> Self {
        self.failing_repository_deletes
            .insert((repository.to_string(), digest(target)));
        self
    }

    pub fn hanging_delete(mut self, target: &str) -> Self {
        self.hanging_deletes.insert(digest(target));
        self
    }

    /// Trip `flag` while the first deletion is in flight.
    pub fn cancel_on_delete(mut self, flag: CancelFlag) -> Self {
        self.cancel_on_delete = Some(flag);
        self
    }
}

#[async_trait]
impl RegistryOps for FakeRegistry {
    async fn list_repositories(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.repositories.clone())
    }

    async fn list_manifests(&self, repository: &str) -> Result<Vec<RawManifest>, RegistryError> {
        if self.failing_listing.as_deref() == Some(repository) {
            return Err(RegistryError::CommandFailed(format!(
                "cannot list '{repository}'"
            )));
        }
        self.manifests
            .get(repository)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(repository.to_string()))
    }

    async fn resolve_tag(&self, repository: &str, tag: &str) -> Result<Digest, RegistryError> {
        self.resolved.lock().push(format!("{repository}:{tag}"));
        self.tags
            .get(&(repository.to_string(), tag.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("{repository}:{tag}")))
    }

    async fn delete_manifest(
        &self,
        repository: &str,
        digest: &Digest,
    ) -> Result<(), RegistryError> {
        if let Some(flag) = &self.cancel_on_delete {
            flag.cancel();
        }
        if self.hanging_deletes.contains(digest) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.failing_deletes.contains(digest)
            || self
                .failing_repository_deletes
                .contains(&(repository.to_string(), digest.clone()))
        {
            return Err(RegistryError::CommandFailed("manifest is locked".to_string()));
        }
        self.deleted
            .lock()
            .push((repository.to_string(), digest.clone()));
        Ok(())
    }
}

pub fn linux(image: &str) -> ConfigSnapshot {
    ConfigSnapshot {
        container: ContainerDescriptor::Linux(format!("DOCKER|{image}")),
        ..Default::default()
    }
}

pub fn custom_image_setting(image: &str) -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot::default();
    snapshot
        .app_settings
        .insert("DOCKER_CUSTOM_IMAGE_NAME".to_string(), image.to_string());
    snapshot
}

/// Workload inventory fake. Anything not configured reads as an error.
#[derive(Default)]
pub struct FakeWorkloads {
    instances: Vec<InstanceDescriptor>,
    active: HashMap<String, ConfigSnapshot>,
    environments: HashMap<String, Vec<String>>,
    environment_configs: HashMap<(String, String), ConfigSnapshot>,
    failing_enumeration: bool,
    pub listed: Mutex<usize>,
}

impl FakeWorkloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app(mut self, name: &str, snapshot: ConfigSnapshot) -> Self {
        self.instances.push(InstanceDescriptor::new(name, "rg"));
        self.active.insert(name.to_string(), snapshot);
        self.environments.insert(name.to_string(), Vec::new());
        self
    }

    /// An app whose active configuration cannot be read.
    pub fn unreadable_app(mut self, name: &str) -> Self {
        self.instances.push(InstanceDescriptor::new(name, "rg"));
        self.environments.insert(name.to_string(), Vec::new());
        self
    }

    /// An app whose slots cannot be listed.
    pub fn app_without_slot_listing(mut self, name: &str, snapshot: ConfigSnapshot) -> Self {
        self.instances.push(InstanceDescriptor::new(name, "rg"));
        self.active.insert(name.to_string(), snapshot);
        self
    }

    pub fn slot(mut self, app: &str, slot: &str, snapshot: ConfigSnapshot) -> Self {
        self.environments
            .entry(app.to_string())
            .or_default()
            .push(slot.to_string());
        self.environment_configs
            .insert((app.to_string(), slot.to_string()), snapshot);
        self
    }

    pub fn failing_enumeration(mut self) -> Self {
        self.failing_enumeration = true;
        self
    }
}

#[async_trait]
impl WorkloadOps for FakeWorkloads {
    async fn list_instances(&self) -> Result<Vec<InstanceDescriptor>, WorkloadError> {
        *self.listed.lock() += 1;
        if self.failing_enumeration {
            return Err(WorkloadError::CommandFailed("forbidden".to_string()));
        }
        Ok(self.instances.clone())
    }

    async fn active_config(
        &self,
        instance: &InstanceDescriptor,
    ) -> Result<ConfigSnapshot, WorkloadError> {
        self.active
            .get(&instance.name)
            .cloned()
            .ok_or_else(|| WorkloadError::CommandFailed(format!("cannot read {}", instance.name)))
    }

    async fn list_environments(
        &self,
        instance: &InstanceDescriptor,
    ) -> Result<Vec<String>, WorkloadError> {
        self.environments
            .get(&instance.name)
            .cloned()
            .ok_or_else(|| WorkloadError::Timeout(Duration::from_secs(1)))
    }

    async fn environment_config(
        &self,
        instance: &InstanceDescriptor,
        environment: &str,
    ) -> Result<ConfigSnapshot, WorkloadError> {
        self.environment_configs
            .get(&(instance.name.clone(), environment.to_string()))
            .cloned()
            .ok_or_else(|| WorkloadError::NotFound(format!("{}/{environment}", instance.name)))
    }
}
