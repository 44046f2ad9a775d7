//! Resolves one question into one answer against the session's backend.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::error::ChatError;
use crate::session::{AnswerRecord, ConversationSession, HistoryEntry};

/// Drives a single turn through the session's chain.
pub struct TurnDispatcher;

impl TurnDispatcher {
    /// Record `question`, run it with the recent history and record the
    /// answer under the same id.
    ///
    /// A failed backend call still yields an answer record (with a
    /// `Failed` outcome) so the display log stays paired; only an empty
    /// question is rejected outright.
    pub async fn submit<'s>(
        session: &'s mut ConversationSession,
        question: &str,
    ) -> Result<&'s AnswerRecord, ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let id = session.log.push_question(question);

        if session.history.is_full() {
            if let Some(evicted) = session.history.evict_oldest() {
                debug!(turn = id, evicted = %evicted.question, "evicted oldest history entry");
            }
        }
        let history = session.history.to_vec();

        debug!(
            session_id = %session.session_id(),
            turn = id,
            history_len = history.len(),
            "dispatching question"
        );
        let started = Instant::now();
        let outcome = session.chain.run(question, &history).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let record = match outcome {
            Ok(result) => {
                session
                    .history
                    .push(HistoryEntry::new(question, result.answer.clone()));
                let record = AnswerRecord::answered(id, result);
                info!(turn = id, sources = record.sources.len(), elapsed_ms, "turn answered");
                record
            }
            Err(err) => {
                if err.is_turn_failure() {
                    warn!(turn = id, elapsed_ms, error = %err, "turn failed");
                } else {
                    error!(turn = id, elapsed_ms, error = %err, "unexpected backend error");
                }
                AnswerRecord::failed(id, err.to_string())
            }
        };

        session.input.clear();
        Ok(session.log.push_answer(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedChain;
    use crate::backend::{AnswerResult, BackendKind, SourceDocument};
    use crate::session::{AnswerOutcome, MAX_HISTORY_LENGTH};

    fn session_with(chain: ScriptedChain) -> ConversationSession {
        ConversationSession::new(BackendKind::OpenAi, Box::new(chain), MAX_HISTORY_LENGTH)
    }

    fn assert_parity(session: &ConversationSession) {
        assert_eq!(session.questions().len(), session.answers().len());
        for (i, (q, a)) in session.questions().iter().zip(session.answers()).enumerate() {
            assert_eq!(q.id, i);
            assert_eq!(a.id, i);
        }
    }

    #[tokio::test]
    async fn test_first_question_scenario() {
        let chain = ScriptedChain::new(vec![Ok(AnswerResult::new("Paris."))]);
        let calls = chain.calls();
        let mut session = session_with(chain);

        let record = TurnDispatcher::submit(&mut session, "What is the capital of France?")
            .await
            .unwrap();
        assert_eq!(record.id, 0);
        assert_eq!(record.text(), "Paris.");

        assert_eq!(
            session.history().to_vec(),
            vec![HistoryEntry::new("What is the capital of France?", "Paris.")]
        );
        assert_eq!(session.questions().len(), 1);
        assert_eq!(session.questions()[0].question, "What is the capital of France?");
        assert_eq!(session.answers()[0].id, 0);
        assert!(calls.lock().unwrap()[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_six_questions_keep_five_most_recent() {
        let chain = ScriptedChain::echo();
        let calls = chain.calls();
        let mut session = session_with(chain);

        for i in 0..6 {
            TurnDispatcher::submit(&mut session, &format!("q{}", i))
                .await
                .unwrap();
            assert!(session.history().len() <= MAX_HISTORY_LENGTH);
            assert_parity(&session);
        }

        assert_eq!(session.history().len(), 5);
        let kept: Vec<_> = session.history().iter().map(|e| e.question.clone()).collect();
        assert_eq!(kept, vec!["q1", "q2", "q3", "q4", "q5"]);

        let ids: Vec<_> = session.answers().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);

        // The sixth call ran after eviction, with four entries of context.
        let calls = calls.lock().unwrap();
        let sixth: Vec<_> = calls[5].1.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(sixth, vec!["q1", "q2", "q3", "q4"]);
        assert_eq!(calls[4].1.len(), 4);
        assert_eq!(calls[3].1.len(), 3);
    }

    #[tokio::test]
    async fn test_eviction_is_fifo() {
        let mut session = session_with(ScriptedChain::echo());
        for i in 0..12usize {
            TurnDispatcher::submit(&mut session, &format!("q{}", i))
                .await
                .unwrap();
            let oldest = session.history().iter().next().unwrap();
            let expected = i.saturating_sub(MAX_HISTORY_LENGTH - 1);
            assert_eq!(oldest.question, format!("q{}", expected));
        }
    }

    #[tokio::test]
    async fn test_sources_follow_document_order() {
        let result = AnswerResult::new("Paris.").with_sources(vec![
            SourceDocument::new("a", "https://example.com/1"),
            SourceDocument::new("b", "https://example.com/2"),
        ]);
        let mut session = session_with(ScriptedChain::new(vec![Ok(result)]));

        let record = TurnDispatcher::submit(&mut session, "Where?").await.unwrap();
        assert_eq!(
            record.sources,
            vec!["https://example.com/1", "https://example.com/2"]
        );
    }

    #[tokio::test]
    async fn test_missing_source_documents_yield_no_sources() {
        let mut session = session_with(ScriptedChain::new(vec![Ok(AnswerResult::new("42"))]));
        let record = TurnDispatcher::submit(&mut session, "Meaning of life?")
            .await
            .unwrap();
        assert!(record.sources.is_empty());
    }

    #[tokio::test]
    async fn test_clear_after_three_turns_restarts_ids() {
        let chain = ScriptedChain::echo();
        let calls = chain.calls();
        let mut session = session_with(chain);
        for q in ["one", "two", "three"] {
            TurnDispatcher::submit(&mut session, q).await.unwrap();
        }

        session.clear();
        assert!(session.history().is_empty());
        assert!(session.questions().is_empty());
        assert!(session.answers().is_empty());

        let record = TurnDispatcher::submit(&mut session, "four").await.unwrap();
        assert_eq!(record.id, 0);
        assert_eq!(session.questions()[0].id, 0);
        assert!(calls.lock().unwrap()[3].1.is_empty());
    }

    #[tokio::test]
    async fn test_failed_turn_records_placeholder() {
        let chain = ScriptedChain::new(vec![
            Ok(AnswerResult::new("first")),
            Err(ChatError::BackendInvocation("connection reset".to_string())),
            Ok(AnswerResult::new("third")),
        ]);
        let mut session = session_with(chain);

        TurnDispatcher::submit(&mut session, "a").await.unwrap();
        let failed = TurnDispatcher::submit(&mut session, "b").await.unwrap();
        assert_eq!(failed.id, 1);
        assert!(failed.is_failed());
        assert!(failed.text().contains("connection reset"));
        assert!(failed.sources.is_empty());

        assert_parity(&session);
        assert_eq!(session.history().len(), 1);

        let third = TurnDispatcher::submit(&mut session, "c").await.unwrap();
        assert_eq!(third.id, 2);
        assert!(matches!(third.outcome, AnswerOutcome::Answered(_)));
        let kept: Vec<_> = session.history().iter().map(|e| e.question.clone()).collect();
        assert_eq!(kept, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_malformed_result_is_recorded_as_failure() {
        let chain = ScriptedChain::new(vec![Err(ChatError::MalformedResult(
            "no answer field".to_string(),
        ))]);
        let mut session = session_with(chain);
        let record = TurnDispatcher::submit(&mut session, "q").await.unwrap();
        assert!(record.is_failed());
        assert!(session.history().is_empty());
        assert_parity(&session);
    }

    #[tokio::test]
    async fn test_empty_question_is_not_recorded() {
        let chain = ScriptedChain::echo();
        let calls = chain.calls();
        let mut session = session_with(chain);

        for blank in ["", "   ", "\n\t"] {
            let err = TurnDispatcher::submit(&mut session, blank).await.unwrap_err();
            assert!(matches!(err, ChatError::EmptyQuestion));
        }
        assert!(session.questions().is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_resets_pending_input() {
        let mut session = session_with(ScriptedChain::echo());
        session.set_input("What time is it?");
        TurnDispatcher::submit(&mut session, "What time is it?")
            .await
            .unwrap();
        assert_eq!(session.input(), "");
    }

    #[tokio::test]
    async fn test_parity_holds_across_mixed_outcomes() {
        let script = (0..20)
            .map(|i| {
                if i % 3 == 0 {
                    Err(ChatError::BackendInvocation(format!("failure {}", i)))
                } else {
                    Ok(AnswerResult::new(format!("answer {}", i)))
                }
            })
            .collect();
        let mut session = session_with(ScriptedChain::new(script));

        for i in 0..20 {
            TurnDispatcher::submit(&mut session, &format!("q{}", i))
                .await
                .unwrap();
            assert_parity(&session);
            assert!(session.history().len() <= MAX_HISTORY_LENGTH);
        }
        assert_eq!(session.answers().iter().filter(|a| a.is_failed()).count(), 7);
    }
}
