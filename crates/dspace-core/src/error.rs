//! Error types for storage, catalog mutations and the external generator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub(crate) fn json(path: impl AsRef<std::path::Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Outcome of an admin mutation that did not go through.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The change was applied in memory but could not be written.
    #[error("catalog saved in memory but not persisted: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Failure of the external answer generator.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("authentication rejected by the completion API")]
    Auth,
    #[error("completion API rejected the request: {0}")]
    BadRequest(String),
    #[error("completion API returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected completion response: {0}")]
    InvalidResponse(String),
    #[error("generator not configured: {0}")]
    Configuration(String),
}

impl GenerateError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::Api { .. } | Self::InvalidResponse(_)
        )
    }
}
