use async_trait::async_trait;
use tracing::debug;

use super::{truncate_body, LanguageModel};
use crate::config::ModelProvider;
use crate::error::ChatError;

/// Flan-T5 text2text inference endpoint (XL and XXL share the wire format)
pub struct FlanModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_length: u32,
}

impl FlanModel {
    pub fn from_config(client: reqwest::Client, provider: &ModelProvider) -> Result<Self, ChatError> {
        if provider.base_url.trim().is_empty() {
            return Err(ChatError::Config(format!(
                "{} has no endpoint configured (set base_url)",
                provider.name
            )));
        }

        Ok(Self {
            client,
            endpoint: provider.base_url.trim().to_string(),
            model: provider.model.clone(),
            api_key: provider.api_key(),
            temperature: provider.temperature,
            max_length: provider.max_tokens,
        })
    }
}

#[async_trait]
impl LanguageModel for FlanModel {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let payload = serde_json::json!({
            "text_inputs": prompt,
            "max_length": self.max_length,
            "temperature": self.temperature
        });

        debug!(model = %self.model, "sending Flan inference request");
        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::BackendInvocation(format!(
                "{} endpoint error ({}): {}",
                self.model,
                status,
                truncate_body(&error_text)
            )));
        }

        let body: serde_json::Value = response.json().await?;
        body.get("generated_texts")
            .and_then(|texts| texts.get(0))
            .and_then(|text| text.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ChatError::MalformedResult(format!("{} response has no generated_texts", self.model))
            })
    }
}
