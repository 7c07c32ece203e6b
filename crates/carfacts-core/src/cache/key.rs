use crate::errors::ConfigError;
use crate::identifier::VehicleIdentifier;
use crate::prompt::PromptTemplate;
use std::fmt;

/// Report flavor sharing one store with other flavors.
///
/// Rendered as `name` or `name.version`. Neither part may contain `:`, so
/// keys from different namespaces can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    name: String,
    version: Option<String>,
}

impl Namespace {
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        validate_part("namespace name", name)?;
        Ok(Self {
            name: name.to_string(),
            version: None,
        })
    }

    pub fn versioned(name: &str, version: &str) -> Result<Self, ConfigError> {
        validate_part("namespace name", name)?;
        validate_part("namespace version", version)?;
        Ok(Self {
            name: name.to_string(),
            version: Some(version.to_string()),
        })
    }

    /// Namespace pinned to the template's version.
    pub fn for_template(name: &str, template: &PromptTemplate) -> Result<Self, ConfigError> {
        Self::versioned(name, &template.version)
    }

    /// Appends a flavor to the version, e.g. `analysis.v3` to `analysis.v3.fake`.
    pub fn with_flavor(self, flavor: &str) -> Result<Self, ConfigError> {
        validate_part("namespace flavor", flavor)?;
        let version = match self.version {
            Some(v) => format!("{}.{}", v, flavor),
            None => flavor.to_string(),
        };
        Ok(Self {
            name: self.name,
            version: Some(version),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn tag(&self) -> String {
        match &self.version {
            Some(v) => format!("{}.{}", self.name, v),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

fn validate_part(what: &str, s: &str) -> Result<(), ConfigError> {
    if s.is_empty() {
        return Err(ConfigError(format!("{} must not be empty", what)));
    }
    if let Some(bad) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ConfigError(format!(
            "{} '{}' contains invalid character {:?} (allowed: A-Z a-z 0-9 - _ .)",
            what, s, bad
        )));
    }
    Ok(())
}

/// `namespace ":" identifier`, identifier used as-is.
pub fn derive_key(namespace: &Namespace, identifier: &VehicleIdentifier) -> String {
    format!("{}:{}", namespace, identifier.as_str())
}

/// Namespace tag of a derived key.
pub fn namespace_of(key: &str) -> Option<&str> {
    key.split_once(':').map(|(ns, _)| ns)
}
