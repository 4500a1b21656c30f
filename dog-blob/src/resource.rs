use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{BlobError, BlobResult, ByteRange, ByteStream, ContentId};

/// Backend-specific byte source behind a [`Resource`].
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Stream the payload, or only the resolved slice of it.
    async fn read(&self, range: Option<&ResolvedRange>) -> BlobResult<ByteStream>;
}

/// Readable handle on one stored payload.
///
/// Handles are single-consumer: [`Resource::open`] takes `self`, so a handle
/// is streamed once and then dropped.
pub struct Resource {
    pub id: ContentId,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<i64>,
    pub accepts_ranges: bool,
    reader: Box<dyn ResourceReader>,
}

/// Range information for partial content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
    pub total_size: u64,
}

impl ResolvedRange {
    pub fn from_request(range: &ByteRange, total_size: u64) -> Self {
        let last = total_size.saturating_sub(1);
        let end = range.end.unwrap_or(last).min(last);
        Self {
            start: range.start,
            end,
            total_size,
        }
    }

    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_full_content(&self) -> bool {
        self.start == 0 && self.end + 1 == self.total_size
    }
}

/// An opened resource ready to be streamed
pub struct OpenedResource {
    pub stream: ByteStream,
    pub size_bytes: u64,
    pub resolved_range: Option<ResolvedRange>,
}

impl Resource {
    pub fn new<R: ResourceReader + 'static>(id: ContentId, size_bytes: u64, reader: R) -> Self {
        Self {
            id,
            size_bytes,
            content_type: None,
            etag: None,
            last_modified: None,
            accepts_ranges: false,
            reader: Box::new(reader),
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_last_modified(mut self, secs: i64) -> Self {
        self.last_modified = Some(secs);
        self
    }

    pub fn with_range_support(mut self) -> Self {
        self.accepts_ranges = true;
        self
    }

    /// Open the payload for reading. A range on a store without range
    /// support falls back to the full content.
    pub async fn open(self, range: Option<ByteRange>) -> BlobResult<OpenedResource> {
        let resolved = match range {
            Some(range) if self.accepts_ranges => {
                if !range.is_valid(self.size_bytes) {
                    return Err(BlobError::invalid(format!(
                        "Range {}-{:?} not satisfiable for {} bytes",
                        range.start, range.end, self.size_bytes
                    )));
                }
                Some(ResolvedRange::from_request(&range, self.size_bytes))
            }
            _ => None,
        };

        let stream = self.reader.read(resolved.as_ref()).await?;
        Ok(OpenedResource {
            stream,
            size_bytes: self.size_bytes,
            resolved_range: resolved,
        })
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("size_bytes", &self.size_bytes)
            .field("content_type", &self.content_type)
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .field("accepts_ranges", &self.accepts_ranges)
            .finish_non_exhaustive()
    }
}

impl OpenedResource {
    /// Check if this is a partial content response
    pub fn is_partial(&self) -> bool {
        self.resolved_range
            .as_ref()
            .map_or(false, |r| !r.is_full_content())
    }

    /// Get content length
    pub fn content_length(&self) -> u64 {
        self.resolved_range
            .as_ref()
            .map_or(self.size_bytes, |r| r.content_length())
    }
}
