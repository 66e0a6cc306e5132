use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkingError {
    #[error("text is empty")]
    EmptyText,
    #[error("chunk limit must be greater than zero")]
    InvalidLimit,
    #[error("offset {0} is outside the text or not on a character boundary")]
    OutOfBounds(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Authentication,
    RateLimited,
    QuotaExceeded,
    Transient,
    InvalidInput,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ProviderErrorKind::Authentication => "authentication",
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::QuotaExceeded => "quota_exceeded",
            ProviderErrorKind::Transient => "transient",
            ProviderErrorKind::InvalidInput => "invalid_input",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{provider} {kind} error: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: &str, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConcatenationError {
    #[error("no audio segments to concatenate")]
    Empty,
    #[error("segment gap: expected index {expected}, found {found}")]
    Gap { expected: usize, found: usize },
    #[error("segment {index} is not a valid MP3 stream: {reason}")]
    Corrupt { index: usize, reason: String },
    #[error("segment {index} format {found} does not match stream format {expected}")]
    FormatMismatch {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("failed to normalize segment {index}: {reason}")]
    Normalization { index: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("concatenation failed: {0}")]
    Concatenation(#[from] ConcatenationError),
    #[error("synthesis cancelled")]
    Cancelled,
}
