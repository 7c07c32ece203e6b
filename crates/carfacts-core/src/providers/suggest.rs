use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_SUGGEST_ENDPOINT: &str = "http://google.com/complete/search";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; carfacts)";

/// Type-ahead suggestions. Never fails: errors degrade to an empty list.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, partial: &str) -> Vec<String>;
}

/// Public search-completion endpoint (`?client=chrome&q=`), JSON shaped
/// `[query, [suggestion, ...], ...]`.
pub struct SearchCompletionSource {
    endpoint: String,
    client: reqwest::Client,
}

impl SearchCompletionSource {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .user_agent(USER_AGENT)
                .build()?,
        })
    }

    async fn fetch(&self, partial: &str) -> anyhow::Result<Vec<String>> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("client", "chrome"), ("q", partial)])
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("suggestion endpoint returned {}", resp.status());
        }
        // Served as text/javascript; parse the body ourselves.
        let body = resp.text().await?;
        let json: serde_json::Value = serde_json::from_str(&body)?;
        let items = json
            .get(1)
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("unexpected suggestion payload shape"))?;
        Ok(items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect())
    }
}

#[async_trait]
impl SuggestionSource for SearchCompletionSource {
    async fn suggest(&self, partial: &str) -> Vec<String> {
        if partial.trim().is_empty() {
            return Vec::new();
        }
        match self.fetch(partial).await {
            Ok(found) => with_query_first(partial, found),
            Err(e) => {
                tracing::warn!(event = "suggest.failed", error = %e);
                Vec::new()
            }
        }
    }
}

/// The typed text is always the first option, so it can be submitted as-is.
fn with_query_first(partial: &str, found: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(found.len() + 1);
    out.push(partial.to_string());
    out.extend(found.into_iter().filter(|s| s != partial));
    out
}
