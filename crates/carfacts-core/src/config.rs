use crate::cache::{CacheOptions, ConcurrencyMode, Namespace};
use crate::errors::ConfigError;
use crate::identifier::IdentifierPolicy;
use crate::prompt::PromptTemplate;
use crate::providers::suggest::DEFAULT_SUGGEST_ENDPOINT;
use crate::providers::vision::DEFAULT_RESOLVER_MAX_TOKENS;
use crate::storage::StoreConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub mod path_resolver;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "carfacts.yaml";
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 3000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub namespace: NamespaceConfig,
    #[serde(default)]
    pub identifier: IdentifierPolicy,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Prompt template YAML; the built-in template when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            namespace: NamespaceConfig::default(),
            identifier: IdentifierPolicy::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            generator: GeneratorConfig::default(),
            prompt_file: None,
            resolver: ResolverConfig::default(),
            suggest: SuggestConfig::default(),
        }
    }
}

/// `version` is `auto` (prompt template version), `none`, or a literal tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    #[serde(default = "default_namespace_name")]
    pub name: String,
    #[serde(default = "default_namespace_version")]
    pub version: String,
}

fn default_namespace_name() -> String {
    "analysis".to_string()
}

fn default_namespace_version() -> String {
    "auto".to_string()
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            name: default_namespace_name(),
            version: default_namespace_version(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub concurrency: ConcurrencyMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorProvider {
    #[default]
    Openai,
    Fake,
}

impl std::str::FromStr for GeneratorProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::Openai),
            "fake" => Ok(Self::Fake),
            other => Err(format!("unknown generator provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub provider: GeneratorProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: GeneratorProvider::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
            timeout_secs: default_timeout_secs(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_resolver_max_tokens")]
    pub max_tokens: u32,
}

fn default_resolver_max_tokens() -> u32 {
    DEFAULT_RESOLVER_MAX_TOKENS
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_resolver_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestConfig {
    #[serde(default = "default_suggest_endpoint")]
    pub endpoint: String,
}

fn default_suggest_endpoint() -> String {
    DEFAULT_SUGGEST_ENDPOINT.to_string()
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            endpoint: default_suggest_endpoint(),
        }
    }
}

impl AppConfig {
    /// Applies `CARFACTS_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CARFACTS_REDIS_HOST") {
            self.store.redis.host = v;
        }
        if let Some(v) = lookup("CARFACTS_REDIS_PORT") {
            self.store.redis.port = v
                .parse()
                .map_err(|_| ConfigError(format!("CARFACTS_REDIS_PORT is not a port: '{}'", v)))?;
        }
        if let Some(v) = lookup("CARFACTS_REDIS_PASSWORD") {
            self.store.redis.password = Some(v);
        }
        if let Some(v) = lookup("CARFACTS_MODEL") {
            self.generator.model = v.clone();
            self.resolver.model = v;
        }
        if let Some(v) = lookup("CARFACTS_CONCURRENCY") {
            self.cache.concurrency = v
                .parse()
                .map_err(|e| ConfigError(format!("CARFACTS_CONCURRENCY: {}", e)))?;
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            concurrency: self.cache.concurrency,
            identifier: self.identifier.clone(),
        }
    }

    pub fn load_prompt(&self) -> Result<PromptTemplate, ConfigError> {
        match &self.prompt_file {
            Some(path) => PromptTemplate::load(path),
            None => Ok(PromptTemplate::builtin()),
        }
    }

    /// Namespace for reports from the configured provider.
    ///
    /// Canned reports from the `fake` provider get their own `.fake` flavor
    /// so they never answer lookups meant for real reports.
    pub fn namespace(&self, template: &PromptTemplate) -> Result<Namespace, ConfigError> {
        let name = &self.namespace.name;
        let namespace = match self.namespace.version.as_str() {
            "auto" => Namespace::for_template(name, template)?,
            "none" => Namespace::new(name)?,
            literal => Namespace::versioned(name, literal)?,
        };
        match self.generator.provider {
            GeneratorProvider::Openai => Ok(namespace),
            GeneratorProvider::Fake => namespace.with_flavor("fake"),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_CONFIG_VERSION {
            return Err(ConfigError(format!(
                "unsupported config version {} (supported: {})",
                self.version, SUPPORTED_CONFIG_VERSION
            )));
        }
        if self.identifier.max_chars == 0 {
            return Err(ConfigError("identifier.max_chars must be at least 1".into()));
        }
        if self.generator.max_tokens == 0 {
            return Err(ConfigError("generator.max_tokens must be at least 1".into()));
        }
        // Fails early on names the key scheme cannot represent.
        self.namespace(&PromptTemplate::builtin())?;
        Ok(())
    }
}

pub fn parse_config(raw: &str) -> Result<AppConfig, ConfigError> {
    let mut ignored = BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);
    let cfg: AppConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    if !ignored.is_empty() {
        tracing::warn!(event = "config.unknown_fields", fields = ?ignored);
    }

    cfg.validate()?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    let mut cfg =
        parse_config(&raw).map_err(|e| ConfigError(format!("{} (file: {})", e, path.display())))?;

    let r = path_resolver::PathResolver::new(path);
    r.resolve_opt(&mut cfg.prompt_file);
    r.resolve(&mut cfg.store.path);

    Ok(cfg)
}

/// Loads `path` if it exists, defaults otherwise. Env overrides apply either way.
pub fn load_or_default(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut cfg = if path.exists() {
        load_config(path)?
    } else {
        tracing::debug!(event = "config.defaults", path = %path.display());
        AppConfig::default()
    };
    cfg.apply_env()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Normalization;
    use crate::storage::StoreBackend;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = parse_config("version: 1\n").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.generator.model, "gpt-4-turbo");
        assert_eq!(cfg.generator.max_tokens, 3000);
        assert_eq!(cfg.resolver.max_tokens, 50);
        assert_eq!(cfg.cache.concurrency, ConcurrencyMode::Unlocked);
        assert_eq!(cfg.identifier.normalize, Normalization::Raw);
    }

    #[test]
    fn test_full_file() {
        let cfg = parse_config(
            r#"
version: 1
namespace:
  name: vehicle
  version: v2
identifier:
  normalize: canonical
  max_chars: 80
cache:
  concurrency: single_flight
store:
  backend: memory
generator:
  provider: fake
  model: gpt-4o
"#,
        )
        .unwrap();
        assert_eq!(cfg.identifier.normalize, Normalization::Canonical);
        assert_eq!(cfg.identifier.max_chars, 80);
        assert_eq!(cfg.cache.concurrency, ConcurrencyMode::SingleFlight);
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.generator.provider, GeneratorProvider::Fake);

        let ns = cfg.namespace(&PromptTemplate::builtin()).unwrap();
        assert_eq!(ns.tag(), "vehicle.v2.fake");
    }

    #[test]
    fn test_namespace_version_modes() {
        let tpl = PromptTemplate::builtin();
        let mut cfg = AppConfig::default();
        assert_eq!(
            cfg.namespace(&tpl).unwrap().tag(),
            format!("analysis.{}", tpl.version)
        );
        cfg.namespace.version = "none".into();
        assert_eq!(cfg.namespace(&tpl).unwrap().tag(), "analysis");
    }

    #[test]
    fn test_fake_provider_gets_its_own_namespace() {
        let tpl = PromptTemplate::builtin();
        let mut cfg = AppConfig::default();
        let real = cfg.namespace(&tpl).unwrap();
        cfg.generator.provider = GeneratorProvider::Fake;
        let fake = cfg.namespace(&tpl).unwrap();
        assert_ne!(real, fake);
        assert_eq!(fake.tag(), format!("analysis.{}.fake", tpl.version));
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let err = parse_config("version: 2\n").unwrap_err();
        assert!(err.0.contains("unsupported config version 2"));
    }

    #[test]
    fn test_rejects_colon_in_namespace() {
        let err = parse_config("version: 1\nnamespace:\n  name: \"a:b\"\n").unwrap_err();
        assert!(err.0.contains("invalid character"));
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let cfg = parse_config("version: 1\ncolour: red\ncache:\n  ttl: 60\n").unwrap();
        assert_eq!(cfg.cache, CacheConfig::default());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("CARFACTS_REDIS_HOST", "redis.internal"),
            ("CARFACTS_REDIS_PORT", "6380"),
            ("CARFACTS_REDIS_PASSWORD", "hunter2"),
            ("CARFACTS_MODEL", "gpt-4o"),
            ("CARFACTS_CONCURRENCY", "single_flight"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.store.redis.host, "redis.internal");
        assert_eq!(cfg.store.redis.port, 6380);
        assert_eq!(cfg.store.redis.password.as_deref(), Some("hunter2"));
        assert_eq!(cfg.generator.model, "gpt-4o");
        assert_eq!(cfg.resolver.model, "gpt-4o");
        assert_eq!(cfg.cache.concurrency, ConcurrencyMode::SingleFlight);
    }

    #[test]
    fn test_bad_port_override() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == "CARFACTS_REDIS_PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert!(err.0.contains("CARFACTS_REDIS_PORT"));
    }

    #[test]
    fn test_load_resolves_paths_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carfacts.yaml");
        std::fs::write(
            &path,
            "version: 1\nprompt_file: prompts/report.yaml\nstore:\n  path: data/reports.db\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.prompt_file, Some(dir.path().join("prompts/report.yaml")));
        assert_eq!(cfg.store.path, dir.path().join("data/reports.db"));
    }
}
