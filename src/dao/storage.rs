use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend refused an atomic write set; none of its updates applied.
    #[error("batch rejected: {message}")]
    Rejected { message: String },
    /// A staged update targets a match the backend does not know about.
    #[error("match `{id}` not found")]
    NotFound { id: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a rejection for a write set that was refused as a whole.
    pub fn rejected(message: impl Into<String>) -> Self {
        StorageError::Rejected {
            message: message.into(),
        }
    }
}
