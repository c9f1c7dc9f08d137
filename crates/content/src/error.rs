//! Error types for content resolution.

use std::path::PathBuf;

/// Errors that can occur while resolving a content hash.
#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    /// Hash parse error
    #[error("invalid content hash: {0:?}")]
    InvalidHash(String),

    /// Blob not found in the configured backend
    #[error("content not found: {0}")]
    NotFound(String),

    /// No response byte arrived within the retry budget
    #[error("request for {hash} timed out after {attempts} attempts")]
    Timeout { hash: String, attempts: u32 },

    /// Non-success HTTP status
    #[error("received status code {status} while reading {hash}")]
    Http {
        hash: String,
        status: reqwest::StatusCode,
    },

    /// Response did not declare its length
    #[error("response for {0} has no content length")]
    MissingLength(String),

    /// HTTP transport error
    #[error("http error: {0}")]
    Request(#[from] reqwest::Error),

    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Credential chain could not produce credentials
    #[error("unable to resolve credentials: {0}")]
    Credentials(String),

    /// IO error
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LocatorError {
    /// True when the backend answered cleanly that the blob does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LocatorError::NotFound(_))
    }
}

/// Result type alias for content resolution.
pub type Result<T> = std::result::Result<T, LocatorError>;
