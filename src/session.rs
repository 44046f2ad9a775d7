use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{AnswerResult, BackendKind, Chain};
use crate::config::Config;
use crate::error::ChatError;

/// Default number of exchanges fed back to the backend.
pub const MAX_HISTORY_LENGTH: usize = 5;

/// One resolved exchange as fed back to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
}

impl HistoryEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Recent exchanges, oldest first, never longer than `capacity`.
#[derive(Debug, Clone)]
pub struct ContextHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl ContextHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn evict_oldest(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_front()
    }

    /// Append, evicting the oldest entry first if already at capacity.
    pub fn push(&mut self, entry: HistoryEntry) {
        while self.is_full() {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A question as shown in the display log.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRecord {
    pub id: usize,
    pub question: String,
    pub asked_at: DateTime<Utc>,
}

/// How a turn resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Answered(AnswerResult),
    /// Placeholder recorded when the backend call failed
    Failed { error: String },
}

/// The answer paired with the question of the same `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRecord {
    pub id: usize,
    pub outcome: AnswerOutcome,
    pub sources: Vec<String>,
    pub answered_at: DateTime<Utc>,
}

impl AnswerRecord {
    pub fn answered(id: usize, result: AnswerResult) -> Self {
        let sources = result.source_names();
        Self {
            id,
            outcome: AnswerOutcome::Answered(result),
            sources,
            answered_at: Utc::now(),
        }
    }

    pub fn failed(id: usize, error: impl Into<String>) -> Self {
        Self {
            id,
            outcome: AnswerOutcome::Failed {
                error: error.into(),
            },
            sources: Vec::new(),
            answered_at: Utc::now(),
        }
    }

    /// Answer text, or the error message for a failed turn
    pub fn text(&self) -> &str {
        match &self.outcome {
            AnswerOutcome::Answered(result) => &result.answer,
            AnswerOutcome::Failed { error } => error,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, AnswerOutcome::Failed { .. })
    }
}

/// Everything shown to the user, unbounded.
#[derive(Debug, Clone, Default)]
pub struct DisplayLog {
    questions: Vec<QuestionRecord>,
    answers: Vec<AnswerRecord>,
}

impl DisplayLog {
    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn next_id(&self) -> usize {
        self.questions.len()
    }

    pub fn push_question(&mut self, question: impl Into<String>) -> usize {
        let id = self.next_id();
        self.questions.push(QuestionRecord {
            id,
            question: question.into(),
            asked_at: Utc::now(),
        });
        id
    }

    pub fn push_answer(&mut self, record: AnswerRecord) -> &AnswerRecord {
        self.answers.push(record);
        &self.answers[self.answers.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty() && self.answers.is_empty()
    }

    pub fn clear(&mut self) {
        self.questions.clear();
        self.answers.clear();
    }
}

/// A question with its answer, if one has been recorded yet.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    pub question: &'a QuestionRecord,
    pub answer: Option<&'a AnswerRecord>,
}

/// Per-user conversation state and the backend it talks to
pub struct ConversationSession {
    session_id: Uuid,
    backend: BackendKind,
    started_at: DateTime<Utc>,
    pub(crate) chain: Box<dyn Chain>,
    pub(crate) history: ContextHistory,
    pub(crate) log: DisplayLog,
    pub(crate) input: String,
}

impl ConversationSession {
    pub fn new(backend: BackendKind, chain: Box<dyn Chain>, max_history_length: usize) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            backend,
            started_at: Utc::now(),
            chain,
            history: ContextHistory::new(max_history_length),
            log: DisplayLog::default(),
            input: String::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn history(&self) -> &ContextHistory {
        &self.history
    }

    pub fn questions(&self) -> &[QuestionRecord] {
        self.log.questions()
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        self.log.answers()
    }

    /// Questions paired with their answers by position
    pub fn turns(&self) -> impl Iterator<Item = Turn<'_>> {
        self.log
            .questions
            .iter()
            .enumerate()
            .map(|(i, question)| Turn {
                question,
                answer: self.log.answers.get(i),
            })
    }

    /// Pending input buffer
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Discard every turn, the context window and the pending input.
    pub fn clear(&mut self) {
        if self.history.is_empty() && self.log.is_empty() && self.input.is_empty() {
            debug!(session_id = %self.session_id, "chat already empty");
            return;
        }
        let turns = self.log.questions.len();
        self.history.clear();
        self.log.clear();
        self.input.clear();
        info!(session_id = %self.session_id, turns, "chat cleared");
    }
}

/// Owns the current session, creating it at most once
pub struct SessionManager {
    config: Config,
    current_session: Option<ConversationSession>,
}

impl SessionManager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            current_session: None,
        }
    }

    /// Resolve `selector`, build its chain and start the session. Calling
    /// this again once a session exists returns that session unchanged.
    pub fn initialize(&mut self, selector: &str) -> Result<&mut ConversationSession, ChatError> {
        let session = match self.current_session.take() {
            Some(existing) => {
                debug!(
                    session_id = %existing.session_id,
                    selector,
                    "session already initialized"
                );
                existing
            }
            None => {
                let backend = BackendKind::resolve(selector)?;
                let chain = backend.build_chain(&self.config)?;
                let session =
                    ConversationSession::new(backend, chain, self.config.max_history_length);
                info!(
                    session_id = %session.session_id,
                    backend = %backend,
                    max_history_length = session.history.capacity(),
                    "session initialized"
                );
                session
            }
        };

        Ok(self.current_session.insert(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedChain;

    fn session() -> ConversationSession {
        ConversationSession::new(
            BackendKind::OpenAi,
            Box::new(ScriptedChain::echo()),
            MAX_HISTORY_LENGTH,
        )
    }

    #[test]
    fn test_context_history_evicts_oldest_first() {
        let mut history = ContextHistory::new(3);
        for i in 0..5 {
            history.push(HistoryEntry::new(format!("q{}", i), format!("a{}", i)));
            assert!(history.len() <= 3);
        }
        let questions: Vec<_> = history.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn test_context_history_capacity_at_least_one() {
        let mut history = ContextHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.push(HistoryEntry::new("a", "b"));
        history.push(HistoryEntry::new("c", "d"));
        assert_eq!(history.to_vec(), vec![HistoryEntry::new("c", "d")]);
    }

    #[test]
    fn test_display_log_ids_follow_insertion_order() {
        let mut log = DisplayLog::default();
        assert_eq!(log.push_question("first"), 0);
        assert_eq!(log.push_question("second"), 1);
        assert_eq!(log.next_id(), 2);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.push_question("again"), 0);
    }

    #[test]
    fn test_answer_record_text() {
        let ok = AnswerRecord::answered(0, AnswerResult::new("Paris"));
        assert_eq!(ok.text(), "Paris");
        assert!(!ok.is_failed());
        assert!(ok.sources.is_empty());

        let failed = AnswerRecord::failed(1, "backend invocation failed: timeout");
        assert_eq!(failed.text(), "backend invocation failed: timeout");
        assert!(failed.is_failed());
    }

    #[test]
    fn test_turns_pair_questions_with_answers() {
        let mut session = session();
        session.log.push_question("one");
        session
            .log
            .push_answer(AnswerRecord::answered(0, AnswerResult::new("1")));
        session.log.push_question("two");

        let turns: Vec<_> = session.turns().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].answer.map(|a| a.text()), Some("1"));
        assert!(turns[1].answer.is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut session = session();
        session.log.push_question("q");
        session
            .log
            .push_answer(AnswerRecord::answered(0, AnswerResult::new("a")));
        session.history.push(HistoryEntry::new("q", "a"));
        session.set_input("half typed");

        session.clear();
        assert!(session.history().is_empty());
        assert!(session.questions().is_empty());
        assert!(session.answers().is_empty());
        assert_eq!(session.input(), "");

        session.clear();
        assert!(session.history().is_empty());
        assert!(session.log.is_empty());
        assert_eq!(session.input(), "");
    }

    #[test]
    fn test_initialize_rejects_unknown_backend() {
        let mut manager = SessionManager::new(Config::default());
        let err = manager.initialize("gpt-j").err().unwrap();
        assert!(matches!(err, ChatError::UnsupportedBackend(_)));
        assert!(manager.current_session.is_none());
    }

    #[test]
    fn test_initialize_builds_session_once() {
        let mut config = Config::default();
        config.anthropic.api_key = Some("test-key".to_string());
        config.max_history_length = 3;
        let mut manager = SessionManager::new(config);

        let first = manager.initialize("anthropic").unwrap();
        assert_eq!(first.backend(), BackendKind::Anthropic);
        assert_eq!(first.history().capacity(), 3);
        let id = first.session_id();
        first.log.push_question("kept");

        // A second initialization, even with another selector, is a no-op.
        let second = manager.initialize("openai").unwrap();
        assert_eq!(second.session_id(), id);
        assert_eq!(second.backend(), BackendKind::Anthropic);
        assert_eq!(second.questions().len(), 1);
    }

    #[test]
    fn test_initialize_surfaces_backend_config_errors() {
        let mut manager = SessionManager::new(Config::default());
        let err = manager.initialize("flanxl").err().unwrap();
        assert!(matches!(err, ChatError::Config(_)));
        assert!(manager.current_session.is_none());
    }
}
