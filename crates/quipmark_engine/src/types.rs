use std::fmt;

use crate::persist::PersistError;

/// Classified remote-service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFailure {
    /// Credentials rejected (401/403). Fatal to the whole run: no further
    /// call can succeed.
    Auth,
    /// The requested object does not exist (404).
    NotFound,
    /// Retryable class (rate limit, gateway errors, timeouts, connection
    /// loss) after the retry policy has been exhausted.
    Transient,
    /// Any other unexpected HTTP status.
    Http(u16),
    /// The response body did not have the expected shape.
    InvalidResponse,
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailure::Auth => write!(f, "authorization rejected"),
            ApiFailure::NotFound => write!(f, "not found"),
            ApiFailure::Transient => write!(f, "transient error, retries exhausted"),
            ApiFailure::Http(code) => write!(f, "http status {code}"),
            ApiFailure::InvalidResponse => write!(f, "invalid response"),
        }
    }
}

/// A failed remote call with its classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiFailure,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: ApiFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Run-wide fatal errors. Everything document-scoped is reported as a
/// failure inside the run report instead.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("authorization rejected: {0}")]
    Auth(String),
    #[error(transparent)]
    OutputDir(#[from] PersistError),
    #[error("root folder {id} unreachable: {source}")]
    Root {
        id: String,
        #[source]
        source: ApiError,
    },
    #[error("could not enumerate accessible folders: {0}")]
    Discovery(ApiError),
    #[error("http client error: {0}")]
    Client(String),
}
