use super::LlmClient;
use crate::model::LlmResponse;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Deterministic offline client for tests and demos.
#[derive(Debug, Clone)]
pub struct FakeClient {
    model: String,
    fixed_response: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeClient {
    pub fn new(model: String) -> Self {
        Self {
            model,
            fixed_response: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_response(mut self, response: String) -> Self {
        self.fixed_response = Some(response);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(&self, _system: &str, user: &str) -> anyhow::Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self
            .fixed_response
            .clone()
            .unwrap_or_else(|| sample_report(user));

        Ok(LlmResponse {
            text,
            provider: "fake".to_string(),
            model: self.model.clone(),
            meta: serde_json::json!({}),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_id(&self) -> String {
        self.model.clone()
    }
}

fn sample_report(vehicle: &str) -> String {
    format!(
        "## 1. **Overall Car Assessment**\n\n\
         | Vehicle | Rating |\n\
         |---|---|\n\
         | {vehicle} | 7/10 🟢 |\n\n\
         The {vehicle} is a sensible all-rounder.\n\n\
         ## 5. **Sources**\n\n\
         - [Example Motoring](https://example.com/reviews)\n"
    )
}
