use async_trait::async_trait;

use crate::{BlobResult, ByteStream, ContentId, Resource};

/// Id-addressed payload storage - implemented by every backend that can hold
/// content for a content-bearing type.
///
/// A store owns the id lifecycle: `put(None, ..)` allocates a fresh id,
/// `put(Some(id), ..)` overwrites that payload in place, and `delete` retires
/// the id for good.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Look up the payload for `id`. `Ok(None)` means no payload exists.
    async fn get(&self, id: &ContentId) -> BlobResult<Option<Resource>>;

    /// Store a payload from a stream, reusing `id` when one is given
    async fn put(&self, id: Option<&ContentId>, stream: ByteStream) -> BlobResult<PutResult>;

    /// Remove the payload and retire its id
    async fn delete(&self, id: &ContentId) -> BlobResult<()>;
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub id: ContentId,
    pub size_bytes: u64,
    pub etag: Option<String>,
}
