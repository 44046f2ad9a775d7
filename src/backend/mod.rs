//! Answer-generation backends.
//!
//! A backend is selected once per session by [`BackendKind`]. Building it
//! yields a [`Chain`], the handle the session keeps for its whole lifetime
//! and runs once per turn.

pub mod anthropic;
pub mod flan;
pub mod openai;
pub mod retriever;
#[cfg(test)]
pub mod testing;

use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::debug;

use crate::config::Config;
use crate::error::ChatError;
use crate::prompts::{self, PromptFamily};
use crate::session::HistoryEntry;

pub use anthropic::AnthropicModel;
pub use flan::FlanModel;
pub use openai::OpenAiModel;
pub use retriever::{DisabledRetriever, HttpRetriever, Retriever};

/// The closed set of backends a session can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    OpenAi,
    Anthropic,
    FlanXl,
    FlanXxl,
}

impl BackendKind {
    /// Resolve a startup selector such as `openai` or `flanxxl`.
    pub fn resolve(selector: &str) -> Result<Self, ChatError> {
        BackendKind::from_str(selector.trim())
            .map_err(|_| ChatError::UnsupportedBackend(selector.to_string()))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "Open AI",
            BackendKind::Anthropic => "Anthropic",
            BackendKind::FlanXl => "Flan XL",
            BackendKind::FlanXxl => "Flan XXL",
        }
    }

    pub fn prompt_family(&self) -> PromptFamily {
        match self {
            BackendKind::OpenAi => PromptFamily::Chat,
            BackendKind::Anthropic => PromptFamily::Anthropic,
            BackendKind::FlanXl | BackendKind::FlanXxl => PromptFamily::Flan,
        }
    }

    /// Build the chain handle for this backend.
    pub fn build_chain(&self, config: &Config) -> Result<Box<dyn Chain>, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ChatError::Config(format!("failed to create HTTP client: {}", e)))?;

        let provider = config.provider(*self);
        let model: Box<dyn LanguageModel> = match self {
            BackendKind::OpenAi => Box::new(OpenAiModel::from_config(client.clone(), provider)?),
            BackendKind::Anthropic => {
                Box::new(AnthropicModel::from_config(client.clone(), provider)?)
            }
            BackendKind::FlanXl | BackendKind::FlanXxl => {
                Box::new(FlanModel::from_config(client.clone(), provider)?)
            }
        };

        let retriever: Box<dyn Retriever> = if config.retriever.enabled {
            Box::new(HttpRetriever::from_config(client, &config.retriever)?)
        } else {
            Box::new(DisabledRetriever)
        };

        Ok(Box::new(RetrievalChain::new(
            model,
            retriever,
            self.prompt_family(),
        )))
    }
}

/// Metadata attached to a retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A retrieved document supporting an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

impl SourceDocument {
    pub fn new(page_content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                title: None,
                extra: serde_json::Map::new(),
            },
        }
    }
}

/// What a backend returns for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_documents: Option<Vec<SourceDocument>>,
}

impl AnswerResult {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            source_documents: None,
        }
    }

    pub fn with_sources(mut self, documents: Vec<SourceDocument>) -> Self {
        self.source_documents = Some(documents);
        self
    }

    /// `metadata.source` of every document, in document order.
    pub fn source_names(&self) -> Vec<String> {
        self.source_documents
            .as_ref()
            .map(|docs| docs.iter().map(|d| d.metadata.source.clone()).collect())
            .unwrap_or_default()
    }
}

/// A built backend: resolves one question against the recent history.
#[async_trait]
pub trait Chain: Send + Sync {
    async fn run(&self, question: &str, history: &[HistoryEntry]) -> Result<AnswerResult, ChatError>;
}

/// Single-prompt text completion against a hosted model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError>;
}

/// Conversational retrieval: condense the follow-up into a standalone
/// question, retrieve supporting documents, then answer from them.
pub struct RetrievalChain {
    model: Box<dyn LanguageModel>,
    retriever: Box<dyn Retriever>,
    family: PromptFamily,
}

impl RetrievalChain {
    pub fn new(
        model: Box<dyn LanguageModel>,
        retriever: Box<dyn Retriever>,
        family: PromptFamily,
    ) -> Self {
        Self {
            model,
            retriever,
            family,
        }
    }

    async fn standalone_question(
        &self,
        question: &str,
        history: &[HistoryEntry],
    ) -> Result<String, ChatError> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = prompts::condense_prompt(self.family, history, question);
        let rewritten = self.model.complete(&prompt).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }
}

#[async_trait]
impl Chain for RetrievalChain {
    async fn run(&self, question: &str, history: &[HistoryEntry]) -> Result<AnswerResult, ChatError> {
        let started = Instant::now();
        let standalone = self.standalone_question(question, history).await?;
        debug!(standalone = %standalone, history_len = history.len(), "condensed question");

        let documents = self.retriever.retrieve(&standalone).await?;
        let context = documents.as_deref().unwrap_or(&[]);
        debug!(documents = context.len(), "retrieved documents");

        let prompt = prompts::qa_prompt(self.family, context, &standalone);
        let answer = self.model.complete(&prompt).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ChatError::MalformedResult(
                "model returned an empty answer".to_string(),
            ));
        }

        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "chain finished");
        Ok(AnswerResult {
            answer: answer.to_string(),
            source_documents: documents,
        })
    }
}

/// Shorten a response body for inclusion in an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 500;
    if body.chars().count() > LIMIT {
        let head: String = body.chars().take(LIMIT).collect();
        format!("{}...", head)
    } else {
        body.to_string()
    }
}
