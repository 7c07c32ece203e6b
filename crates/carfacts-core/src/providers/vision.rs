use super::llm::OpenAIClient;
use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

pub const IDENTIFY_INSTRUCTION: &str = "Reply with only the car year, make, and model name.";
pub const DEFAULT_RESOLVER_MAX_TOKENS: u32 = 50;

/// Turns a photograph into a vehicle description.
#[async_trait]
pub trait VehicleIdentifierResolver: Send + Sync {
    async fn resolve(&self, image: &[u8]) -> anyhow::Result<String>;
}

/// JPEG and PNG are the accepted upload formats.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else {
        None
    }
}

pub fn data_url(bytes: &[u8]) -> anyhow::Result<String> {
    let mime = sniff_image_mime(bytes)
        .ok_or_else(|| anyhow::anyhow!("unsupported image format (expected JPEG or PNG)"))?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", mime, b64))
}

pub struct OpenAiVisionResolver {
    client: OpenAIClient,
}

impl OpenAiVisionResolver {
    /// `client.max_tokens` should stay small; the answer is a single line.
    pub fn new(client: OpenAIClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VehicleIdentifierResolver for OpenAiVisionResolver {
    async fn resolve(&self, image: &[u8]) -> anyhow::Result<String> {
        let url = data_url(image)?;
        let messages = vec![json!({
            "role": "user",
            "content": [
                { "type": "text", "text": IDENTIFY_INSTRUCTION },
                { "type": "image_url", "image_url": { "url": url } }
            ]
        })];
        let resp = self.client.chat(messages).await?;
        let answer = resp.text.trim().to_string();
        if answer.is_empty() {
            anyhow::bail!("vision model returned an empty answer");
        }
        tracing::debug!(event = "resolver.identified", model = %resp.model, answer = %answer);
        Ok(answer)
    }
}

/// Resolver that always answers with the same vehicle. Offline runs and tests.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    answer: String,
}

impl StaticResolver {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

#[async_trait]
impl VehicleIdentifierResolver for StaticResolver {
    async fn resolve(&self, image: &[u8]) -> anyhow::Result<String> {
        sniff_image_mime(image)
            .ok_or_else(|| anyhow::anyhow!("unsupported image format (expected JPEG or PNG)"))?;
        Ok(self.answer.clone())
    }
}
