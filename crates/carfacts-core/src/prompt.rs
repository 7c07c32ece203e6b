use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Placeholder replaced with the vehicle identifier when rendering.
pub const IDENTIFIER_PLACEHOLDER: &str = "{identifier}";

pub const BUILTIN_PROMPT_YAML: &str = include_str!("../prompts/vehicle-report.yaml");

/// A versioned system prompt for report generation.
///
/// The version participates in the cache namespace, so shipping a new prompt
/// never serves reports written for an older one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub version: String,
    pub body: String,
}

impl PromptTemplate {
    pub fn builtin() -> Self {
        // Parsed from a file compiled into the binary; covered by tests.
        Self::from_yaml(BUILTIN_PROMPT_YAML).unwrap_or_else(|_| Self {
            id: "vehicle-report".into(),
            version: "builtin".into(),
            body: format!("Write a factual report about '{}'.", IDENTIFIER_PLACEHOLDER),
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let tpl: PromptTemplate = serde_yaml::from_str(raw)
            .map_err(|e| ConfigError(format!("failed to parse prompt template: {}", e)))?;
        tpl.validate()?;
        Ok(tpl)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigError(format!(
                "failed to read prompt template {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&raw)
            .map_err(|e| ConfigError(format!("{} (file: {})", e, path.display())))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError("prompt template has an empty id".into()));
        }
        if self.version.trim().is_empty() {
            return Err(ConfigError(format!(
                "prompt template '{}' has an empty version",
                self.id
            )));
        }
        if self.body.trim().is_empty() {
            return Err(ConfigError(format!(
                "prompt template '{}' has an empty body",
                self.id
            )));
        }
        Ok(())
    }

    pub fn render(&self, identifier: &str) -> String {
        self.body.replace(IDENTIFIER_PLACEHOLDER, identifier)
    }

    /// Stable hash of id, version and body.
    pub fn fingerprint(&self) -> String {
        let mut h = Sha256::new();
        h.update(self.id.as_bytes());
        h.update(b"\n");
        h.update(self.version.as_bytes());
        h.update(b"\n");
        h.update(self.body.as_bytes());
        hex::encode(h.finalize())
    }
}
