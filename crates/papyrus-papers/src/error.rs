use papyrus_llm::LlmError;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid paper id: {0}")]
    InvalidId(String),

    #[error("paper not found: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned status {status}")]
    Status { provider: String, status: u16 },

    #[error("rate limited by paper repository")]
    RateLimited,

    #[error("failed to parse feed: {0}")]
    Parse(String),

    #[error("failed to extract PDF text: {0}")]
    Pdf(String),

    #[error("PDF is {0} bytes, over the size limit")]
    PdfTooLarge(usize),
}

impl SourceError {
    /// True for failures of the remote repository rather than of the caller's input.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Status { .. }
                | Self::RateLimited
                | Self::Parse(_)
                | Self::Pdf(_)
                | Self::PdfTooLarge(_)
        )
    }
}

impl From<LlmError> for SourceError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Http(e) => Self::Http(e),
            LlmError::RateLimited => Self::RateLimited,
            other => Self::Parse(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
