use thiserror::Error;

use crate::types::SourceKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Query embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Similarity threshold {0} is outside [0.0, 1.0]")]
    InvalidThreshold(f32),

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid query syntax: {0}")]
    InvalidQuerySyntax(String),

    #[error("{generator} retrieval unavailable: {reason}")]
    RetrievalUnavailable { generator: SourceKind, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Who is at fault for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Client,
    Server,
}

impl Error {
    pub fn unavailable(generator: SourceKind, reason: impl std::fmt::Display) -> Self {
        Error::RetrievalUnavailable { generator, reason: reason.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DimensionMismatch { .. }
            | Error::InvalidThreshold(_)
            | Error::InvalidWeights(_)
            | Error::InvalidRequest(_)
            | Error::InvalidQuerySyntax(_) => ErrorKind::Client,
            Error::RetrievalUnavailable { .. } | Error::InvalidConfig(_) => ErrorKind::Server,
        }
    }

    /// Only backend unavailability is worth retrying; the core never retries itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RetrievalUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
