use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use uuid::Uuid;

use crate::{BlobError, BlobResult};

/// Stream of bytes for content payloads
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Wrap an in-memory buffer as a single-chunk `ByteStream`.
pub fn bytes_stream<B: Into<Bytes>>(data: B) -> ByteStream {
    let data = data.into();
    Box::pin(futures_util::stream::once(async move { Ok(data) }))
}

/// Opaque key a store uses to address one payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    /// Generate a new random content ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ids end up as file names and object keys, so they must stay a single
    /// path segment.
    pub fn validate(&self) -> BlobResult<()> {
        let id = self.0.as_str();
        if id.is_empty() {
            return Err(BlobError::invalid("Content id must not be empty"));
        }
        if id.starts_with('.') || id.contains('/') || id.contains('\\') || id.contains('\0') {
            return Err(BlobError::invalid(format!("Content id {id:?} is not a single path segment")));
        }
        Ok(())
    }
}

impl Default for ContentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Byte range for partial content requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>, // None means "to end of file"
}

impl ByteRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    pub fn from_start(start: u64) -> Self {
        Self { start, end: None }
    }

    pub fn is_valid(&self, total_size: u64) -> bool {
        if self.start >= total_size {
            return false;
        }
        match self.end {
            Some(end) => end >= self.start,
            None => true,
        }
    }
}
