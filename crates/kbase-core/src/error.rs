use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Empty corpus: at least one document is required to build an index")]
    EmptyCorpus,

    #[error("Empty vocabulary: {0}")]
    Vocabulary(String),

    #[error("Invalid dimensions: {0}")]
    Dimension(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Query is empty")]
    EmptyQuery,

    /// A load surfaced through the snapshot cache. `source` is shared by every
    /// caller that waited on the same load.
    #[error("Snapshot load failed for {key}: {source}")]
    CacheLoad { key: String, source: Arc<Error> },

    #[error("Timed out after {waited:?} waiting for snapshot {key}")]
    Timeout { key: String, waited: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// Peel off any `CacheLoad` wrappers and return the original failure.
    pub fn root(&self) -> &Error {
        match self {
            Error::CacheLoad { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
