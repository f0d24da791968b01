// ABOUTME: Content-addressed manifest digest with case normalization.
// ABOUTME: Digests compare by exact lowercase value, regardless of registry casing.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseDigestError {
    #[error("digest cannot be empty")]
    Empty,

    #[error("digest is missing an algorithm prefix: {0}")]
    MissingAlgorithm(String),

    #[error("invalid character in digest: {0}")]
    InvalidChar(char),
}

/// A manifest digest such as `sha256:0f1e...`.
///
/// The stored value is always lowercase. Registries may report the same
/// digest with different casing, and identity must not depend on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn parse(input: &str) -> Result<Self, ParseDigestError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseDigestError::Empty);
        }

        let (algorithm, hex) = input
            .split_once(':')
            .ok_or_else(|| ParseDigestError::MissingAlgorithm(input.to_string()))?;

        if algorithm.is_empty() || hex.is_empty() {
            return Err(ParseDigestError::MissingAlgorithm(input.to_string()));
        }

        for c in input.chars() {
            if !c.is_ascii_alphanumeric() && c != ':' && c != '+' && c != '.' && c != '_' && c != '-'
            {
                return Err(ParseDigestError::InvalidChar(c));
            }
        }

        Ok(Self(input.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in progress lines: algorithm plus 12 hex chars.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .find(':')
            .map(|i| i + 13)
            .unwrap_or(12)
            .min(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Digest::parse(&value).map_err(serde::de::Error::custom)
    }
}
