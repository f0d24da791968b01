// ABOUTME: Azure CLI command runner backing the registry and workload collaborators.
// ABOUTME: Spawns `az` with a timeout and decodes its JSON output.

mod registry;
mod webapp;

pub use registry::AcrRegistry;
pub use webapp::AppServiceInventory;

use std::process::Stdio;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::process::Command;

use crate::registry::RegistryError;
use crate::workload::WorkloadError;

/// How long `az --version` may take before giving up.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum AzError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("command exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

impl AzError {
    /// Whether the CLI reported that the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            AzError::Failed { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                stderr.contains("not found")
                    || stderr.contains("notfound")
                    || stderr.contains("does not exist")
            }
            _ => false,
        }
    }
}

impl From<AzError> for RegistryError {
    fn from(e: AzError) -> Self {
        match e {
            AzError::Timeout(d) => RegistryError::Timeout(d),
            AzError::Json(e) => RegistryError::Malformed(e.to_string()),
            e if e.is_not_found() => RegistryError::NotFound(e.to_string()),
            e => RegistryError::CommandFailed(e.to_string()),
        }
    }
}

impl From<AzError> for WorkloadError {
    fn from(e: AzError) -> Self {
        match e {
            AzError::Timeout(d) => WorkloadError::Timeout(d),
            AzError::Json(e) => WorkloadError::Malformed(e.to_string()),
            e if e.is_not_found() => WorkloadError::NotFound(e.to_string()),
            e => WorkloadError::CommandFailed(e.to_string()),
        }
    }
}

/// Invokes the Azure CLI.
#[derive(Debug, Clone)]
pub struct AzCli {
    program: String,
    subscription: Option<String>,
    command_timeout: Duration,
}

impl AzCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            subscription: None,
            command_timeout: Duration::from_secs(300),
        }
    }

    /// Scope every command to a subscription.
    pub fn subscription(mut self, subscription: impl Into<String>) -> Self {
        self.subscription = Some(subscription.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run a command and return its stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String, AzError> {
        self.run_with_timeout(args, self.command_timeout).await
    }

    /// Run a command with a custom timeout.
    pub async fn run_with_timeout(
        &self,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, AzError> {
        match tokio::time::timeout(timeout, self.run_inner(args)).await {
            Ok(result) => result,
            Err(_) => Err(AzError::Timeout(timeout)),
        }
    }

    /// Run a command and decode its stdout as JSON.
    pub async fn json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, AzError> {
        let stdout = self.run(args).await?;
        Ok(serde_json::from_str(&stdout)?)
    }

    /// First line of `az --version`, if the CLI answers.
    pub async fn version(&self) -> Option<String> {
        let mut command = Command::new(&self.program);
        command
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(VERSION_TIMEOUT, command.output())
            .await
            .ok()?
            .ok()?;
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
    }

    async fn run_inner(&self, args: &[&str]) -> Result<String, AzError> {
        let mut command = Command::new(&self.program);
        command.args(args);
        if let Some(subscription) = &self.subscription {
            command.args(["--subscription", subscription]);
        }
        command
            .args(["--output", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program = %self.program, args = %args.join(" "), "running command");

        let output = command.output().await.map_err(|source| AzError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(AzError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> AzError {
        AzError::Failed {
            code: Some(3),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn not_found_maps_to_registry_not_found() {
        let err: RegistryError = failed("ERROR: The requested data does not exist.").into();
        assert!(matches!(err, RegistryError::NotFound(_)));

        let err: RegistryError = failed("ERROR: unauthorized").into();
        assert!(matches!(err, RegistryError::CommandFailed(_)));
    }

    #[test]
    fn timeout_is_preserved() {
        let err: WorkloadError = AzError::Timeout(Duration::from_secs(2)).into();
        assert!(matches!(err, WorkloadError::Timeout(d) if d == Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let az = AzCli::new("acr-sweep-no-such-program");
        let err = az.run(&["acr", "repository", "list"]).await.unwrap_err();
        assert!(matches!(err, AzError::Spawn { .. }));
        assert_eq!(az.version().await, None);
    }
}
