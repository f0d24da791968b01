// ABOUTME: Workload image reference parsing relative to a registry login server.
// ABOUTME: Handles repo, repo:tag and repo@digest forms, defaulting the tag to latest.

use super::digest::{Digest, ParseDigestError};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),

    #[error("invalid digest in image reference: {0}")]
    InvalidDigest(#[from] ParseDigestError),
}

/// What a reference points at inside its repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceTarget {
    /// Mutable label that must be resolved through the registry.
    Tag(String),
    /// Already canonical; no lookup needed.
    Digest(Digest),
}

/// An image reference with the registry host stripped off.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    repository: String,
    target: ReferenceTarget,
}

impl ImageReference {
    /// Parse a reference as declared by a workload, e.g.
    /// `myregistry.azurecr.io/team/api:v3`.
    ///
    /// The `<login_server>/` prefix is removed case-insensitively when
    /// present. References without tag or digest get the `latest` tag.
    pub fn parse(input: &str, login_server: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        for c in input.chars() {
            if !c.is_ascii_alphanumeric()
                && c != '/'
                && c != ':'
                && c != '.'
                && c != '-'
                && c != '_'
                && c != '@'
            {
                return Err(ParseImageRefError::InvalidChar(c));
            }
        }

        let without_host = strip_login_server(input, login_server);

        // Digest form wins over any tag that may precede it
        if let Some((name, digest)) = without_host.split_once('@') {
            let digest = Digest::parse(digest)?;
            let (repository, _) = split_tag(name);
            return Self::build(repository, ReferenceTarget::Digest(digest), input);
        }

        let (repository, tag) = split_tag(without_host);
        let tag = match tag {
            Some("") => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
            Some(tag) => tag.to_string(),
            None => DEFAULT_TAG.to_string(),
        };

        Self::build(repository, ReferenceTarget::Tag(tag), input)
    }

    fn build(
        repository: &str,
        target: ReferenceTarget,
        input: &str,
    ) -> Result<Self, ParseImageRefError> {
        if repository.is_empty() || repository.starts_with('/') || repository.ends_with('/') {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        Ok(Self {
            repository: repository.to_string(),
            target,
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn target(&self) -> &ReferenceTarget {
        &self.target
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.target {
            ReferenceTarget::Tag(tag) => Some(tag),
            ReferenceTarget::Digest(_) => None,
        }
    }

    pub fn digest(&self) -> Option<&Digest> {
        match &self.target {
            ReferenceTarget::Digest(digest) => Some(digest),
            ReferenceTarget::Tag(_) => None,
        }
    }
}

fn strip_login_server<'a>(input: &'a str, login_server: &str) -> &'a str {
    let prefix_len = login_server.len() + 1;
    let matches_prefix = input.len() > prefix_len
        && input[..login_server.len()].eq_ignore_ascii_case(login_server)
        && input.as_bytes()[login_server.len()] == b'/';

    if matches_prefix {
        &input[prefix_len..]
    } else {
        input
    }
}

/// Split `name:tag` on the last colon. A colon followed by a path segment
/// belongs to a host port, not a tag.
fn split_tag(input: &str) -> (&str, Option<&str>) {
    match input.rsplit_once(':') {
        Some((before, after)) if !after.contains('/') => (before, Some(after)),
        _ => (input, None),
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            ReferenceTarget::Tag(tag) => write!(f, "{}:{}", self.repository, tag),
            ReferenceTarget::Digest(digest) => write!(f, "{}@{}", self.repository, digest),
        }
    }
}
