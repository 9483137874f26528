//! Error types for the retrieval engine
//!
//! Component errors ([`VectorError`], [`StoreError`], [`PersistenceError`])
//! convert into [`RetrieverError`], which classifies every failure into one of
//! five [`ErrorKind`]s.

use std::fmt;

use thiserror::Error;

use crate::persistence::PersistenceError;
use crate::store::StoreError;
use crate::types::Position;
use crate::vector::VectorError;

/// Coarse classification of a [`RetrieverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The engine or strategy is not set up for the requested operation
    Configuration,
    /// Caller input was rejected
    Validation,
    /// A position or id does not exist
    Lookup,
    /// Persisted state is missing, partial or inconsistent
    Persistence,
    /// The embedding backend failed
    Backend,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::Lookup => "lookup",
            Self::Persistence => "persistence",
            Self::Backend => "backend",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for retrieval operations
#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error("Retriever is not initialized (state: {state})\nSuggestion: Call initialize() before searching")]
    NotInitialized { state: &'static str },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Query is empty")]
    EmptyQuery,

    #[error("k must be at least 1, got {k}")]
    InvalidK { k: usize },

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(#[source] StoreError),

    #[error("No record at position {position}")]
    RecordNotFound { position: Position },

    #[error("No record with id '{id}'")]
    UnknownId { id: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Vector(#[from] VectorError),
}

impl From<StoreError> for RetrieverError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OutOfRange { position, .. } => Self::RecordNotFound { position },
            other => Self::InvalidCorpus(other),
        }
    }
}

impl RetrieverError {
    /// Which of the five error kinds this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized { .. } | Self::Config { .. } => ErrorKind::Configuration,
            Self::EmptyQuery | Self::InvalidK { .. } | Self::InvalidCorpus(_) => {
                ErrorKind::Validation
            }
            Self::RecordNotFound { .. } | Self::UnknownId { .. } => ErrorKind::Lookup,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Vector(err) => match err {
                VectorError::NotFitted { .. }
                | VectorError::UnknownModel(_)
                | VectorError::InvalidDimension { .. }
                | VectorError::DimensionMismatch { .. } => ErrorKind::Configuration,
                VectorError::TooManyVectors(_) => ErrorKind::Validation,
                VectorError::Storage(_)
                | VectorError::InvalidFormat(_)
                | VectorError::VersionMismatch { .. } => ErrorKind::Persistence,
                VectorError::EmbeddingFailed(_)
                | VectorError::NonFiniteEmbedding { .. }
                | VectorError::ModelInit(_)
                | VectorError::InvalidScore { .. } => ErrorKind::Backend,
            },
        }
    }

    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::NotInitialized { .. } => "NOT_INITIALIZED",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::InvalidK { .. } => "INVALID_K",
            Self::InvalidCorpus(_) => "INVALID_CORPUS",
            Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Self::UnknownId { .. } => "UNKNOWN_ID",
            Self::Persistence(PersistenceError::IncompleteState { .. }) => "INCOMPLETE_INDEX",
            Self::Persistence(PersistenceError::NotFound { .. }) => "INDEX_NOT_FOUND",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Vector(VectorError::NotFitted { .. }) => "NOT_FITTED",
            Self::Vector(_) => match self.kind() {
                ErrorKind::Backend => "EMBEDDING_ERROR",
                ErrorKind::Persistence => "PERSISTENCE_ERROR",
                _ => "VECTOR_ERROR",
            },
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::NotInitialized { .. } => vec![
                "Build the index with 'wenda build --corpus <file>'",
                "Check that index_path in .wenda/settings.toml points at the built index",
            ],
            Self::Persistence(PersistenceError::IncompleteState { .. })
            | Self::Persistence(PersistenceError::Mismatch { .. }) => vec![
                "Run 'wenda build --corpus <file> --force' to rebuild from scratch",
                "Check for disk errors or an interrupted save",
            ],
            Self::Persistence(PersistenceError::NotFound { .. }) => {
                vec!["Run 'wenda build --corpus <file>' to create the index"]
            }
            Self::InvalidCorpus(_) => vec![
                "Every record needs a unique id and a non-empty question and answer",
                "Re-run the cleaning step that produced the corpus file",
            ],
            Self::Vector(VectorError::ModelInit(_)) => vec![
                "Ensure you have internet connection for first-time model download",
                "Set embedding.cache_dir to a writable directory",
            ],
            Self::Vector(VectorError::UnknownModel(_)) => vec![
                "Use a supported model such as ParaphraseMLMiniLML12V2",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for retrieval operations
pub type RetrieverResult<T> = Result<T, RetrieverError>;
