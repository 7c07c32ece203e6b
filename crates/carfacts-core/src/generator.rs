use crate::identifier::VehicleIdentifier;
use crate::prompt::PromptTemplate;
use crate::providers::llm::LlmClient;
use async_trait::async_trait;
use std::sync::Arc;

/// Produces a report for a vehicle. Non-deterministic and slow; the cache
/// calls it at most once per observed miss.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(
        &self,
        identifier: &VehicleIdentifier,
        template: &PromptTemplate,
    ) -> anyhow::Result<String>;
}

/// Template rendered into the system message, identifier as the user message.
#[derive(Clone)]
pub struct LlmReportGenerator {
    client: Arc<dyn LlmClient>,
}

impl LlmReportGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportGenerator for LlmReportGenerator {
    async fn generate(
        &self,
        identifier: &VehicleIdentifier,
        template: &PromptTemplate,
    ) -> anyhow::Result<String> {
        let system = template.render(identifier.as_str());
        let resp = self.client.complete(&system, identifier.as_str()).await?;

        let report = resp.text.trim();
        if report.is_empty() {
            anyhow::bail!(
                "{} model '{}' returned an empty report",
                self.client.provider_name(),
                self.client.model_id()
            );
        }

        tracing::debug!(
            event = "generator.completed",
            provider = self.client.provider_name(),
            model = %resp.model,
            template = %template.id,
            template_version = %template.version,
            bytes = report.len(),
        );
        Ok(report.to_string())
    }
}
