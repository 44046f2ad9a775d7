//! In-memory chains, models and retrievers for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{AnswerResult, Chain, LanguageModel, Retriever, SourceDocument};
use crate::error::ChatError;
use crate::session::HistoryEntry;

/// Chain that replays queued results and records the history it was given.
pub struct ScriptedChain {
    results: Mutex<VecDeque<Result<AnswerResult, ChatError>>>,
    calls: Arc<Mutex<Vec<(String, Vec<HistoryEntry>)>>>,
}

impl ScriptedChain {
    pub fn new(results: Vec<Result<AnswerResult, ChatError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers every question with `answer to <question>`.
    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<(String, Vec<HistoryEntry>)>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Chain for ScriptedChain {
    async fn run(&self, question: &str, history: &[HistoryEntry]) -> Result<AnswerResult, ChatError> {
        self.calls
            .lock()
            .unwrap()
            .push((question.to_string(), history.to_vec()));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AnswerResult::new(format!("answer to {}", question))))
    }
}

/// Model that returns queued completions and records prompts.
pub struct ScriptedModel {
    completions: Mutex<VecDeque<String>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(completions: Vec<&str>) -> Self {
        Self {
            completions: Mutex::new(completions.into_iter().map(String::from).collect()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChatError::BackendInvocation("no scripted completion left".to_string()))
    }
}

/// Retriever that always returns the same documents.
pub struct StaticRetriever {
    documents: Vec<SourceDocument>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StaticRetriever {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self {
            documents,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn queries(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.queries)
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, query: &str) -> Result<Option<Vec<SourceDocument>>, ChatError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(Some(self.documents.clone()))
    }
}
