//! Error types for the chat core and its backends.

/// Errors raised while starting a session or resolving a turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("unsupported backend: {0} (expected one of openai, anthropic, flanxl, flanxxl)")]
    UnsupportedBackend(String),
    #[error("backend invocation failed: {0}")]
    BackendInvocation(String),
    #[error("malformed backend result: {0}")]
    MalformedResult(String),
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// Whether this error belongs to a single turn and should be recorded
    /// as a failed answer instead of aborting the session.
    pub fn is_turn_failure(&self) -> bool {
        matches!(
            self,
            ChatError::BackendInvocation(_) | ChatError::MalformedResult(_)
        )
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::MalformedResult(err.to_string())
        } else {
            ChatError::BackendInvocation(err.to_string())
        }
    }
}
