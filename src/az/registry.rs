// ABOUTME: Container registry collaborator over `az acr repository`.
// ABOUTME: Lists repositories and manifests, resolves tags, deletes manifests by digest.

use async_trait::async_trait;
use serde::Deserialize;

use super::AzCli;
use crate::registry::{RawManifest, RegistryError, RegistryOps};
use crate::types::{Digest, RegistryName};

#[derive(Debug, Deserialize)]
struct ShowImage {
    #[serde(default)]
    digest: Option<String>,
}

/// An Azure Container Registry reached through the Azure CLI.
#[derive(Debug, Clone)]
pub struct AcrRegistry {
    az: AzCli,
    name: RegistryName,
}

impl AcrRegistry {
    pub fn new(az: AzCli, name: RegistryName) -> Self {
        Self { az, name }
    }

    /// The command a hard deletion of `repository@digest` runs.
    pub fn delete_command(&self, repository: &str, digest: &Digest) -> String {
        format!(
            "{} acr repository delete --name {} --image {repository}@{digest} --yes",
            self.az.program(),
            self.name
        )
    }
}

#[async_trait]
impl RegistryOps for AcrRegistry {
    async fn list_repositories(&self) -> Result<Vec<String>, RegistryError> {
        let name = self.name.as_str();
        Ok(self
            .az
            .json(&["acr", "repository", "list", "--name", name])
            .await?)
    }

    async fn list_manifests(&self, repository: &str) -> Result<Vec<RawManifest>, RegistryError> {
        let name = self.name.as_str();
        Ok(self
            .az
            .json(&[
                "acr",
                "repository",
                "show-manifests",
                "--name",
                name,
                "--repository",
                repository,
                "--detail",
            ])
            .await?)
    }

    async fn resolve_tag(&self, repository: &str, tag: &str) -> Result<Digest, RegistryError> {
        let name = self.name.as_str();
        let image = format!("{repository}:{tag}");
        let shown: ShowImage = self
            .az
            .json(&["acr", "repository", "show", "--name", name, "--image", &image])
            .await?;

        let digest = shown
            .digest
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| RegistryError::Malformed(format!("no digest reported for '{image}'")))?;
        Digest::parse(&digest).map_err(|e| RegistryError::Malformed(e.to_string()))
    }

    async fn delete_manifest(
        &self,
        repository: &str,
        digest: &Digest,
    ) -> Result<(), RegistryError> {
        let name = self.name.as_str();
        let image = format!("{repository}@{digest}");
        self.az
            .run(&[
                "acr", "repository", "delete", "--name", name, "--image", &image, "--yes",
            ])
            .await?;
        Ok(())
    }
}
