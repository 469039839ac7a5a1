use thiserror::Error;

/// Failure from the language-model gateway. Rate limiting is split out so
/// callers can show "try again later" instead of "service misconfigured".
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("language model rate limited or over quota")]
    RateLimited,
    #[error("language model request failed: {0}")]
    Gateway(String),
    #[error("language model returned an empty completion")]
    EmptyCompletion,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech synthesis not available for {0}")]
    UnsupportedLanguage(crate::Language),
    #[error("speech synthesis request failed: {0}")]
    Gateway(String),
}

#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StoreError(pub String);

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("content generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("audio synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    /// A scenario/lesson/session/content item that does not exist or does
    /// not belong to the requesting user. Never retried automatically.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("game session {id} is already completed")]
    SessionCompleted { id: String },

    #[error("session already has a result for content {hash}")]
    DuplicateResult { hash: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
