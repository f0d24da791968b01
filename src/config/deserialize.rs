// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Rejects a zero concurrency limit and a blank CLI program.

use serde::Deserialize;

pub fn deserialize_concurrency<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = usize::deserialize(deserializer)?;
    if value == 0 {
        return Err(serde::de::Error::custom("concurrency must be at least 1"));
    }
    Ok(value)
}

pub fn deserialize_program<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(serde::de::Error::custom("az_command cannot be empty"));
    }
    Ok(trimmed.to_string())
}
