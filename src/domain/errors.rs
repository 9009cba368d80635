use std::path::PathBuf;

use thiserror::Error;

use super::models::Domain;

/// Domain-level errors shared across application components.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Static term data could not be loaded. Fatal during startup.
    #[error("data load error: {0}")]
    DataLoad(#[from] DataLoadError),

    /// The embedding model is unavailable or produced an unusable vector.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The incoming query or text payload violated invariants (e.g. empty text).
    #[error("validation error: {0}")]
    Validation(String),

    /// A vector with zero magnitude was passed to cosine similarity.
    #[error("degenerate vector: {0}")]
    DegenerateVector(String),

    /// Requested entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other unexpected failure.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl DomainError {
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateVector(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for failures caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }
}

/// Reasons a domain term file could not be turned into term records.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("no data source configured for domain `{0}`")]
    Unconfigured(Domain),

    #[error("term file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed term file {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("invalid record #{index} in {}: {reason}", path.display())]
    InvalidRecord {
        path: PathBuf,
        index: usize,
        reason: String,
    },

    #[error("no terms loaded from any domain")]
    Empty,
}

impl DataLoadError {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}
