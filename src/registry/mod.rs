// ABOUTME: Registry collaborator trait consumed by the reconciliation engine.
// ABOUTME: List repositories and manifests, resolve tags, delete manifests by digest.

use crate::types::Digest;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Read and delete operations against a single container registry.
#[async_trait]
pub trait RegistryOps: Send + Sync {
    /// List every repository in the registry.
    async fn list_repositories(&self) -> Result<Vec<String>, RegistryError>;

    /// List every manifest stored in a repository.
    async fn list_manifests(&self, repository: &str) -> Result<Vec<RawManifest>, RegistryError>;

    /// Resolve a tag to the digest it currently points at.
    async fn resolve_tag(&self, repository: &str, tag: &str) -> Result<Digest, RegistryError>;

    /// Delete a manifest (and every tag pointing at it).
    async fn delete_manifest(&self, repository: &str, digest: &Digest)
    -> Result<(), RegistryError>;
}

/// A manifest as reported by the registry, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawManifest {
    #[serde(default)]
    pub digest: String,

    #[serde(default)]
    pub tags: Option<Vec<String>>,

    #[serde(default)]
    pub created_time: Option<String>,

    #[serde(default, rename = "imageSize")]
    pub size_bytes: u64,
}

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("registry command failed: {0}")]
    CommandFailed(String),

    #[error("registry call timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed registry response: {0}")]
    Malformed(String),
}
