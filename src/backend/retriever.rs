use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{truncate_body, SourceDocument};
use crate::config::RetrieverConfig;
use crate::error::ChatError;

/// Source of supporting documents for a question.
///
/// `Ok(None)` means retrieval is not part of this chain at all, as opposed
/// to `Ok(Some(vec![]))` where nothing matched.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Option<Vec<SourceDocument>>, ChatError>;
}

/// Chain without document retrieval
pub struct DisabledRetriever;

#[async_trait]
impl Retriever for DisabledRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Option<Vec<SourceDocument>>, ChatError> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    documents: Vec<SourceDocument>,
}

/// Client for a JSON retrieval service fronting the document index
pub struct HttpRetriever {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    top_k: usize,
}

impl HttpRetriever {
    pub fn from_config(client: reqwest::Client, config: &RetrieverConfig) -> Result<Self, ChatError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ChatError::Config("retriever.endpoint is not configured".to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: config.api_key(),
            top_k: config.top_k,
        })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, query: &str) -> Result<Option<Vec<SourceDocument>>, ChatError> {
        let payload = serde_json::json!({
            "query": query,
            "top_k": self.top_k
        });

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::BackendInvocation(format!(
                "retriever error ({}): {}",
                status,
                truncate_body(&error_text)
            )));
        }

        let body: RetrieveResponse = response.json().await?;
        let mut documents = body.documents;
        documents.truncate(self.top_k);
        debug!(count = documents.len(), "retriever returned documents");
        Ok(Some(documents))
    }
}
