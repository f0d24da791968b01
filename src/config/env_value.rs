// ABOUTME: Config string values with environment variable interpolation.
// ABOUTME: A value is either a literal or a reference to an environment variable.

use crate::error::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        EnvValue::Literal(value.to_string())
    }
}

/// Resolve an optional value, treating blank results as unset.
pub fn resolve_optional(value: Option<&EnvValue>) -> Result<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let resolved = value.resolve()?;
    let trimmed = resolved.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}
