use crate::cache::ReportCache;
use crate::errors::{ReportError, ReportResult};
use crate::identifier::VehicleIdentifier;
use crate::model::{Analysis, AnalysisInput};
use crate::providers::suggest::SuggestionSource;
use crate::providers::vision::VehicleIdentifierResolver;
use std::sync::Arc;

/// Front door for a vehicle query: resolves the input to an identifier,
/// then goes through the report cache.
pub struct VehicleAssistant {
    cache: Arc<ReportCache>,
    resolver: Option<Arc<dyn VehicleIdentifierResolver>>,
    suggestions: Option<Arc<dyn SuggestionSource>>,
}

impl VehicleAssistant {
    pub fn new(cache: Arc<ReportCache>) -> Self {
        Self {
            cache,
            resolver: None,
            suggestions: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn VehicleIdentifierResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Arc<dyn SuggestionSource>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    pub async fn analyze(&self, input: AnalysisInput, refresh: bool) -> ReportResult<Analysis> {
        let identifier = match input {
            AnalysisInput::Query(text) => self.cache.parse_identifier(&text)?,
            AnalysisInput::Image(bytes) => self.identify(&bytes).await?,
        };

        let outcome = if refresh {
            self.cache.regenerate(&identifier).await?
        } else {
            self.cache.get_or_generate(&identifier).await?
        };

        Ok(Analysis {
            identifier,
            key: outcome.key,
            report: outcome.report,
            source: outcome.source,
        })
    }

    /// Image to identifier. Fails before the cache is touched.
    pub async fn identify(&self, image: &[u8]) -> ReportResult<VehicleIdentifier> {
        let resolver = self.resolver.as_ref().ok_or_else(|| ReportError::ResolverFailed {
            source: anyhow::anyhow!("no image resolver configured"),
        })?;

        let answer = resolver
            .resolve(image)
            .await
            .map_err(|source| ReportError::ResolverFailed { source })?;

        self.cache.parse_identifier(answer.trim()).map_err(|e| {
            ReportError::ResolverFailed {
                source: anyhow::anyhow!("resolver answer rejected: {}", e),
            }
        })
    }

    /// Empty when no suggestion source is configured.
    pub async fn suggest(&self, partial: &str) -> Vec<String> {
        match &self.suggestions {
            Some(source) => source.suggest(partial).await,
            None => Vec::new(),
        }
    }
}
