// ABOUTME: Azure Container Registry name validation.
// ABOUTME: Registry names are 5-50 alphanumeric characters and derive the login server.

use std::fmt;
use thiserror::Error;

pub const LOGIN_SERVER_SUFFIX: &str = "azurecr.io";

#[derive(Debug, Error)]
pub enum RegistryNameError {
    #[error("registry name cannot be empty")]
    Empty,

    #[error("registry name must be between 5 and 50 characters")]
    InvalidLength,

    #[error("invalid character in registry name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryName(String);

impl RegistryName {
    pub fn new(value: &str) -> Result<Self, RegistryNameError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RegistryNameError::Empty);
        }

        if let Some(c) = value.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(RegistryNameError::InvalidChar(c));
        }

        if !(5..=50).contains(&value.len()) {
            return Err(RegistryNameError::InvalidLength);
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Default login server hostname, e.g. `myregistry.azurecr.io`.
    pub fn login_server(&self) -> String {
        format!("{}.{}", self.0.to_ascii_lowercase(), LOGIN_SERVER_SUFFIX)
    }
}

impl fmt::Display for RegistryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
