use async_trait::async_trait;
use tracing::debug;

use super::{truncate_body, LanguageModel};
use crate::config::ModelProvider;
use crate::error::ChatError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API client
pub struct AnthropicModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicModel {
    pub fn from_config(client: reqwest::Client, provider: &ModelProvider) -> Result<Self, ChatError> {
        let api_key = provider.api_key().ok_or_else(|| {
            ChatError::Config(format!(
                "no API key for {} (set {})",
                provider.name,
                provider.api_key_env.as_deref().unwrap_or("api_key")
            ))
        })?;

        Ok(Self {
            client,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            model: provider.model.clone(),
            api_key,
            temperature: provider.temperature,
            max_tokens: provider.max_tokens,
        })
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let url = format!("{}/v1/messages", self.base_url);

        let payload = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });

        debug!(model = %self.model, "sending Anthropic messages request");
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::BackendInvocation(format!(
                "Anthropic API error ({}): {}",
                status,
                truncate_body(&error_text)
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let text = body
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| {
                blocks
                    .iter()
                    .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .find_map(|block| block.get("text").and_then(|t| t.as_str()))
            });

        text.map(str::to_string).ok_or_else(|| {
            ChatError::MalformedResult("Anthropic response has no text content".to_string())
        })
    }
}
