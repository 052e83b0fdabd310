use papyrus_llm::LlmError;
use papyrus_memory::MemoryError;
use papyrus_papers::SourceError;

use crate::prompts::PromptError;

/// Failure categories surfaced by every assistant operation.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("generation failed: {0}")]
    Generation(String),
}

impl AssistantError {
    /// Stable machine-readable tag for API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Upstream(_) => "upstream_failure",
            Self::Generation(_) => "generation_error",
        }
    }
}

impl From<SourceError> for AssistantError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidQuery(_) | SourceError::InvalidId(_) => {
                Self::InvalidInput(err.to_string())
            }
            SourceError::NotFound(id) => Self::NotFound(format!("paper {id}")),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<MemoryError> for AssistantError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Upstream(other.to_string()),
        }
    }
}

/// Completion provider failures; embedding failures arrive wrapped in [`MemoryError`].
impl From<LlmError> for AssistantError {
    fn from(err: LlmError) -> Self {
        Self::Generation(err.to_string())
    }
}

impl From<PromptError> for AssistantError {
    fn from(err: PromptError) -> Self {
        Self::Generation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_map_to_categories() {
        let err: AssistantError = SourceError::InvalidQuery("too short".into()).into();
        assert!(matches!(err, AssistantError::InvalidInput(_)));

        let err: AssistantError = SourceError::NotFound("arxiv:2301.00001".into()).into();
        assert!(matches!(err, AssistantError::NotFound(msg) if msg.contains("2301.00001")));

        let err: AssistantError = SourceError::RateLimited.into();
        assert!(matches!(err, AssistantError::Upstream(_)));
    }

    #[test]
    fn memory_errors_map_to_categories() {
        let err: AssistantError = MemoryError::InvalidInput("k must be at least 1".into()).into();
        assert_eq!(err.code(), "invalid_input");

        let err: AssistantError =
            MemoryError::Embedding(LlmError::Other("embedding down".into())).into();
        assert_eq!(err.code(), "upstream_failure");
    }

    #[test]
    fn llm_errors_are_generation_failures() {
        let err: AssistantError = LlmError::Unavailable.into();
        assert_eq!(err.code(), "generation_error");
        assert_eq!(err.to_string(), "generation failed: provider unavailable");
    }
}
