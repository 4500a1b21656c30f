use thiserror::Error;

/// Result type for content store operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur inside a content store
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Content id {id} was retired and cannot be written again")]
    Retired { id: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn retired<S: Into<String>>(id: S) -> Self {
        Self::Retired { id: id.into() }
    }
}
