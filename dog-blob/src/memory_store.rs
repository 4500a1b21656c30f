use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    bytes_stream, BlobConfig, BlobError, BlobResult, ByteStream, ContentId, ContentStore, PutResult,
    Resource, ResourceReader, ResolvedRange,
};

/// In-process content store, handy for tests and demos.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    config: BlobConfig,
}

#[derive(Default)]
struct MemoryState {
    blobs: HashMap<ContentId, StoredBlob>,
    retired: HashSet<ContentId>,
}

#[derive(Clone)]
struct StoredBlob {
    data: Bytes,
    etag: String,
    modified: i64,
}

struct MemoryReader {
    data: Bytes,
}

#[async_trait]
impl ResourceReader for MemoryReader {
    async fn read(&self, range: Option<&ResolvedRange>) -> BlobResult<ByteStream> {
        let data = match range {
            Some(r) => self.data.slice(r.start as usize..=r.end as usize),
            None => self.data.clone(),
        };
        Ok(bytes_stream(data))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BlobConfig) -> Self {
        Self {
            state: Arc::default(),
            config,
        }
    }

    /// Number of payloads currently held
    pub fn len(&self) -> usize {
        self.state.read().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        self.state.read().blobs.contains_key(id)
    }
}

/// Drain a stream into memory, refusing anything above `max_bytes`.
pub(crate) async fn collect_limited(mut stream: ByteStream, max_bytes: u64) -> BlobResult<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if data.len() as u64 + chunk.len() as u64 > max_bytes {
            return Err(BlobError::invalid(format!(
                "Payload exceeds maximum of {} bytes",
                max_bytes
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get(&self, id: &ContentId) -> BlobResult<Option<Resource>> {
        let state = self.state.read();
        Ok(state.blobs.get(id).map(|blob| {
            Resource::new(id.clone(), blob.data.len() as u64, MemoryReader { data: blob.data.clone() })
                .with_etag(blob.etag.clone())
                .with_last_modified(blob.modified)
                .with_range_support()
        }))
    }

    async fn put(&self, id: Option<&ContentId>, stream: ByteStream) -> BlobResult<PutResult> {
        let id = match id {
            Some(id) => {
                id.validate()?;
                if self.state.read().retired.contains(id) {
                    return Err(BlobError::retired(id.as_str()));
                }
                id.clone()
            }
            None => ContentId::new(),
        };

        let data = Bytes::from(collect_limited(stream, self.config.max_blob_bytes).await?);
        let size_bytes = data.len() as u64;
        let etag = format!("\"{}\"", Uuid::new_v4().simple());

        let mut state = self.state.write();
        // The id may have been retired while the body was streaming in
        if state.retired.contains(&id) {
            return Err(BlobError::retired(id.as_str()));
        }
        state.blobs.insert(
            id.clone(),
            StoredBlob {
                data,
                etag: etag.clone(),
                modified: chrono::Utc::now().timestamp(),
            },
        );
        tracing::debug!(content_id = %id, size_bytes, "stored payload in memory");

        Ok(PutResult {
            id,
            size_bytes,
            etag: Some(etag),
        })
    }

    async fn delete(&self, id: &ContentId) -> BlobResult<()> {
        let mut state = self.state.write();
        state.blobs.remove(id);
        state.retired.insert(id.clone());
        Ok(())
    }
}
