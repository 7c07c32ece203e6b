use crate::model::LlmResponse;
use async_trait::async_trait;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One chat completion: `system` instructions, `user` message.
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<LlmResponse>;
    fn provider_name(&self) -> &'static str;
    fn model_id(&self) -> String;
}

pub mod fake;
pub mod openai;

pub use fake::FakeClient;
pub use openai::OpenAIClient;
