use crate::errors::{ReportError, ReportResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_MAX_IDENTIFIER_CHARS: usize = 200;

/// How an identifier is shaped before it reaches key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Keep the text exactly as received. "Honda Accord" and "honda accord"
    /// are different vehicles as far as the cache is concerned.
    #[default]
    Raw,
    /// Trim, collapse inner whitespace, lowercase.
    Canonical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierPolicy {
    #[serde(default)]
    pub normalize: Normalization,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_IDENTIFIER_CHARS
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self {
            normalize: Normalization::Raw,
            max_chars: DEFAULT_MAX_IDENTIFIER_CHARS,
        }
    }
}

/// A free-form vehicle description ("2010 Honda Accord EX") that passed validation.
///
/// Only constructed through [`VehicleIdentifier::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VehicleIdentifier(String);

impl VehicleIdentifier {
    pub fn parse(raw: &str, policy: &IdentifierPolicy) -> ReportResult<Self> {
        if raw.trim().is_empty() {
            return Err(ReportError::invalid_identifier("identifier is empty"));
        }

        let value = match policy.normalize {
            Normalization::Raw => raw.to_string(),
            Normalization::Canonical => canonicalize(raw),
        };

        let chars = value.chars().count();
        if chars > policy.max_chars {
            return Err(ReportError::invalid_identifier(format!(
                "identifier is {} characters long (max {})",
                chars, policy.max_chars
            )));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VehicleIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn canonicalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
