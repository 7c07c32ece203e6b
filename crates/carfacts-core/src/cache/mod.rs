//! Cache-aside access to generated vehicle reports.
//!
//! A hit is served from the [`ReportStore`] with no generator call. A miss
//! generates once, writes the result, then returns it. Failed generations
//! leave the store untouched so the next request tries again.

pub mod key;
mod single_flight;

use crate::errors::{ReportError, ReportResult};
use crate::generator::ReportGenerator;
use crate::identifier::{IdentifierPolicy, VehicleIdentifier};
use crate::model::{CachedReport, ReportSource};
use crate::prompt::PromptTemplate;
use crate::storage::ReportStore;
use serde::{Deserialize, Serialize};
use single_flight::SingleFlight;
use std::sync::Arc;

pub use key::{derive_key, namespace_of, Namespace};

/// Behaviour for concurrent misses on one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Each concurrent miss generates and writes; last write wins.
    #[default]
    Unlocked,
    /// One generation per key at a time; waiters re-read the store.
    SingleFlight,
}

impl std::str::FromStr for ConcurrencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "unlocked" => Ok(Self::Unlocked),
            "single_flight" | "single-flight" => Ok(Self::SingleFlight),
            other => Err(format!(
                "unknown concurrency mode '{}' (expected unlocked or single_flight)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    pub concurrency: ConcurrencyMode,
    pub identifier: IdentifierPolicy,
}

pub struct ReportCache {
    namespace: Namespace,
    store: Arc<dyn ReportStore>,
    generator: Arc<dyn ReportGenerator>,
    template: PromptTemplate,
    options: CacheOptions,
    flights: SingleFlight,
}

impl ReportCache {
    pub fn new(
        namespace: Namespace,
        store: Arc<dyn ReportStore>,
        generator: Arc<dyn ReportGenerator>,
        template: PromptTemplate,
        options: CacheOptions,
    ) -> Self {
        Self {
            namespace,
            store,
            generator,
            template,
            options,
            flights: SingleFlight::new(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Validates raw input with this cache's identifier policy.
    pub fn parse_identifier(&self, raw: &str) -> ReportResult<VehicleIdentifier> {
        VehicleIdentifier::parse(raw, &self.options.identifier)
    }

    pub fn key_for(&self, identifier: &VehicleIdentifier) -> String {
        derive_key(&self.namespace, identifier)
    }

    /// Store read only; never generates.
    pub async fn lookup(&self, identifier: &VehicleIdentifier) -> ReportResult<Option<String>> {
        let key = self.key_for(identifier);
        self.read(&key).await
    }

    pub async fn get_or_generate(
        &self,
        identifier: &VehicleIdentifier,
    ) -> ReportResult<CachedReport> {
        let key = self.key_for(identifier);

        if let Some(report) = self.read(&key).await? {
            return Ok(self.hit(key, report));
        }

        match self.options.concurrency {
            ConcurrencyMode::Unlocked => {
                tracing::info!(event = "report_cache.miss", key = %key, namespace = %self.namespace);
                self.generate_and_store(identifier, key).await
            }
            ConcurrencyMode::SingleFlight => {
                let _flight = self.flights.acquire(&key).await;
                // Another caller may have filled the key while we waited.
                if let Some(report) = self.read(&key).await? {
                    return Ok(self.hit(key, report));
                }
                tracing::info!(event = "report_cache.miss", key = %key, namespace = %self.namespace);
                self.generate_and_store(identifier, key).await
            }
        }
    }

    /// Generates unconditionally and overwrites the stored report.
    /// On failure the previous value survives.
    pub async fn regenerate(&self, identifier: &VehicleIdentifier) -> ReportResult<CachedReport> {
        let key = self.key_for(identifier);
        tracing::info!(event = "report_cache.refresh", key = %key, namespace = %self.namespace);
        match self.options.concurrency {
            ConcurrencyMode::Unlocked => self.generate_and_store(identifier, key).await,
            ConcurrencyMode::SingleFlight => {
                let _flight = self.flights.acquire(&key).await;
                self.generate_and_store(identifier, key).await
            }
        }
    }

    fn hit(&self, key: String, report: String) -> CachedReport {
        tracing::info!(
            event = "report_cache.hit",
            key = %key,
            namespace = %self.namespace,
            bytes = report.len(),
        );
        CachedReport {
            key,
            report,
            source: ReportSource::Cache,
        }
    }

    async fn read(&self, key: &str) -> ReportResult<Option<String>> {
        self.store
            .get(key)
            .await
            .map_err(|source| self.store_unavailable(key, source))
    }

    async fn generate_and_store(
        &self,
        identifier: &VehicleIdentifier,
        key: String,
    ) -> ReportResult<CachedReport> {
        let report = match self.generator.generate(identifier, &self.template).await {
            Ok(report) if !report.trim().is_empty() => report,
            Ok(_) => {
                return Err(self.generation_failed(
                    identifier,
                    &key,
                    anyhow::anyhow!("generator returned an empty report"),
                ))
            }
            Err(source) => return Err(self.generation_failed(identifier, &key, source)),
        };

        self.store
            .set(&key, &report)
            .await
            .map_err(|source| self.store_unavailable(&key, source))?;

        tracing::info!(
            event = "report_cache.store",
            key = %key,
            namespace = %self.namespace,
            backend = self.store.backend_name(),
            bytes = report.len(),
        );

        Ok(CachedReport {
            key,
            report,
            source: ReportSource::Live,
        })
    }

    fn store_unavailable(&self, key: &str, source: anyhow::Error) -> ReportError {
        tracing::error!(
            event = "report_cache.store_unavailable",
            key = %key,
            backend = self.store.backend_name(),
            error = %source,
        );
        ReportError::StoreUnavailable {
            key: key.to_string(),
            source,
        }
    }

    fn generation_failed(
        &self,
        identifier: &VehicleIdentifier,
        key: &str,
        source: anyhow::Error,
    ) -> ReportError {
        tracing::warn!(
            event = "report_cache.generation_failed",
            key = %key,
            error = %source,
        );
        ReportError::GenerationFailed {
            identifier: identifier.to_string(),
            source,
        }
    }
}
