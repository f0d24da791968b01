// ABOUTME: Usage extractor: which registry images do running workloads declare?
// ABOUTME: Scans active configs and every deployment slot, filtered to one login server.

use std::collections::BTreeMap;

use futures::{StreamExt, stream};
use nonempty::NonEmpty;

use crate::diagnostics::{Diagnostics, Warning};
use crate::types::WorkloadInstance;
use crate::workload::{ConfigSnapshot, InstanceDescriptor, WorkloadError, WorkloadOps};

/// Raw image reference → workload instances declaring it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageUsage {
    references: BTreeMap<String, NonEmpty<WorkloadInstance>>,
}

impl ImageUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `instance` to the reference's list, inserting the list if new.
    pub fn record(&mut self, image: &str, instance: WorkloadInstance) {
        match self.references.get_mut(image) {
            Some(instances) => instances.push(instance),
            None => {
                self.references
                    .insert(image.to_string(), NonEmpty::new(instance));
            }
        }
    }

    pub fn references(&self) -> impl Iterator<Item = (&str, &NonEmpty<WorkloadInstance>)> {
        self.references
            .iter()
            .map(|(image, instances)| (image.as_str(), instances))
    }

    pub fn instances_for(&self, image: &str) -> Option<&NonEmpty<WorkloadInstance>> {
        self.references.get(image)
    }

    /// Number of distinct references.
    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

/// The snapshot's declared image, if it lives in the target registry.
///
/// The check is a case-insensitive substring match on the login server.
/// Images from other registries are not an error, just not ours.
pub fn registry_image<'a>(snapshot: &'a ConfigSnapshot, login_server: &str) -> Option<&'a str> {
    let image = snapshot.declared_image()?;
    if image
        .to_ascii_lowercase()
        .contains(&login_server.to_ascii_lowercase())
    {
        Some(image)
    } else {
        tracing::debug!(%image, %login_server, "ignoring image from another registry");
        None
    }
}

enum Observation {
    Config {
        instance: WorkloadInstance,
        snapshot: Result<ConfigSnapshot, WorkloadError>,
    },
    EnvironmentsUnavailable {
        app: String,
        error: WorkloadError,
    },
}

async fn observe_instance<W: WorkloadOps + ?Sized>(
    workloads: &W,
    descriptor: InstanceDescriptor,
) -> Vec<Observation> {
    tracing::debug!(app = %descriptor.name, "checking workload");

    let mut observations = vec![Observation::Config {
        instance: WorkloadInstance::primary(&descriptor.name),
        snapshot: workloads.active_config(&descriptor).await,
    }];

    match workloads.list_environments(&descriptor).await {
        Ok(environments) => {
            for environment in environments {
                let snapshot = workloads
                    .environment_config(&descriptor, &environment)
                    .await;
                observations.push(Observation::Config {
                    instance: WorkloadInstance::slot(&descriptor.name, environment),
                    snapshot,
                });
            }
        }
        Err(error) => observations.push(Observation::EnvironmentsUnavailable {
            app: descriptor.name.clone(),
            error,
        }),
    }

    observations
}

/// Collect every registry image declared by a workload instance or slot.
///
/// Only the enumeration itself is fatal. A configuration that cannot be
/// read is reported and skipped, and each slot is read independently of
/// its parent. Up to `concurrency` instances are inspected at once;
/// results are accumulated in enumeration order.
pub async fn collect_usage<W: WorkloadOps + ?Sized>(
    workloads: &W,
    login_server: &str,
    concurrency: usize,
    diag: &mut Diagnostics,
) -> Result<ImageUsage, WorkloadError> {
    let instances = workloads.list_instances().await?;
    tracing::info!(count = instances.len(), "found workload instances");

    let observations: Vec<Vec<Observation>> = stream::iter(instances)
        .map(|descriptor| observe_instance(workloads, descriptor))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut usage = ImageUsage::new();
    for observation in observations.into_iter().flatten() {
        match observation {
            Observation::Config {
                instance,
                snapshot: Ok(snapshot),
            } => match registry_image(&snapshot, login_server) {
                Some(image) => {
                    tracing::debug!(%instance, %image, "workload uses registry image");
                    usage.record(image, instance);
                }
                None => tracing::debug!(%instance, "no registry image configured"),
            },
            Observation::Config {
                instance,
                snapshot: Err(error),
            } => diag.warn(Warning::unreadable_config(format!(
                "could not read configuration of '{instance}': {error}"
            ))),
            Observation::EnvironmentsUnavailable { app, error } => {
                diag.warn(Warning::unreadable_config(format!(
                    "could not list deployment slots of '{app}': {error}"
                )))
            }
        }
    }

    tracing::info!(images = usage.len(), "distinct registry images in use");
    Ok(usage)
}
