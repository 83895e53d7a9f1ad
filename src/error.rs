//! Error taxonomy for ingestion, index construction, and queries.
//!
//! | Kind | Variants | Handling |
//! |------|----------|----------|
//! | Ingestion | [`Error::Ingestion`] | fatal, nothing is written |
//! | Construction | [`Error::DuplicateId`], [`Error::InvalidRecord`], [`Error::EmptySnapshot`], [`Error::SelfTest`] | fatal, previous index kept |
//! | Query execution | [`Error::Store`], [`Error::Timeout`] | surfaced per request, retryable |
//!
//! Lookup misses (unknown id, empty page) are not errors; they come back as
//! `None` or an empty result page.

use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed snapshot {}: {reason}", path.display())]
    Ingestion { path: PathBuf, reason: String },

    #[error("duplicate skill id in snapshot: {0}")]
    DuplicateId(String),

    #[error("invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("refusing to replace the index with an empty snapshot")]
    EmptySnapshot,

    #[error("index self-test failed for term {term:?}: {reason}")]
    SelfTest { term: String, reason: String },

    #[error("index store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn ingestion(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Ingestion {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for query-path failures a caller may retry (store connectivity,
    /// deadline exceeded). Ingestion and construction errors are never
    /// retryable: the input itself must change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Timeout(_))
    }
}
