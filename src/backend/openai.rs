use async_trait::async_trait;
use tracing::debug;

use super::{truncate_body, LanguageModel};
use crate::config::ModelProvider;
use crate::error::ChatError;

/// OpenAI chat completions client
pub struct OpenAiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiModel {
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
impl LanguageModel for OpenAiModel {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let payload = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });

        debug!(model = %self.model, "sending OpenAI completion request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::BackendInvocation(format!(
                "OpenAI API error ({}): {}",
                status,
                truncate_body(&error_text)
            )));
        }

        let body: serde_json::Value = response.json().await?;
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ChatError::MalformedResult("OpenAI response has no message content".to_string())
            })
    }
}
