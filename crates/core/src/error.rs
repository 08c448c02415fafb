//! Error types for the helperbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// Shown to a user when the completion call failed.
pub const ANSWER_FAILED_MESSAGE: &str = "Couldn't generate response, please try again!";

/// Shown to a user for every other failure while processing a question.
pub const PROCESSING_FAILED_MESSAGE: &str = "couldn't process question, try again later!";

/// The top-level error type for all helperbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Token counting ---
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    // --- Retrieval ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Answer generation ---
    #[error(transparent)]
    Answer(#[from] AnswerError),

    // --- Corpus loading ---
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),
}

impl Error {
    /// The fixed, non-diagnostic text a user-facing surface may display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Answer(_) => ANSWER_FAILED_MESSAGE,
            _ => PROCESSING_FAILED_MESSAGE,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Token counting failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizerError {
    #[error("No tokenizer is known for model '{0}'")]
    UnsupportedModel(String),
}

/// Relevance ranking failures.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Embedding service error: {0}")]
    EmbeddingService(#[source] ProviderError),

    #[error("Embedding service returned no vector")]
    EmptyEmbedding,

    #[error("Query embedding has {query} dimensions, corpus has {corpus}")]
    DimensionMismatch { query: usize, corpus: usize },
}

/// Completion call failures, surfaced to users as one fixed message.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("{}", ANSWER_FAILED_MESSAGE)]
    Generation(#[source] ProviderError),
}

/// Corpus loading failures (fatal at startup).
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Failed to read corpus at {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Corpus is missing the '{0}' column")]
    MissingColumn(String),

    #[error("Row {row}: invalid embedding: {reason}")]
    InvalidEmbedding { row: usize, reason: String },

    #[error("Row {row}: embedding has {found} dimensions, expected {expected}")]
    InconsistentDimension {
        row: usize,
        expected: usize,
        found: usize,
    },
}
