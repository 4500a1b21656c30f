use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
    BlobConfig, BlobError, BlobResult, ByteStream, ContentId, ContentStore, PutResult, Resource,
    ResourceReader, ResolvedRange,
};

/// Content store keeping one file per content id under a root directory.
///
/// Writes land in a temporary sibling file and are renamed into place, so an
/// outstanding [`Resource`] never observes a half-written payload. Deleting an
/// id leaves a `.{id}.retired` marker next to the payloads; the marker outlives
/// the process, so a retired id stays retired across restarts.
#[derive(Clone)]
pub struct FilesystemStore {
    root: PathBuf,
    config: BlobConfig,
}

struct FileReader {
    path: PathBuf,
}

#[async_trait]
impl ResourceReader for FileReader {
    async fn read(&self, range: Option<&ResolvedRange>) -> BlobResult<ByteStream> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        match range {
            Some(r) => {
                file.seek(SeekFrom::Start(r.start)).await?;
                Ok(Box::pin(ReaderStream::new(file.take(r.content_length()))))
            }
            None => Ok(Box::pin(ReaderStream::new(file))),
        }
    }
}

impl FilesystemStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::with_config(root, BlobConfig::default())
    }

    pub fn with_config<P: Into<PathBuf>>(root: P, config: BlobConfig) -> Self {
        let root = root.into();
        tracing::info!(root = %root.display(), "File system root set");
        Self { root, config }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &ContentId) -> BlobResult<PathBuf> {
        id.validate()?;
        Ok(self.root.join(id.as_str()))
    }

    // Ids never start with '.', so markers and temp names cannot collide with payloads
    fn marker_for(&self, id: &ContentId) -> PathBuf {
        self.root.join(format!(".{id}.retired"))
    }

    async fn is_retired(&self, id: &ContentId) -> BlobResult<bool> {
        Ok(tokio::fs::try_exists(self.marker_for(id)).await?)
    }

    fn etag_for(meta: &std::fs::Metadata) -> (String, Option<i64>) {
        let modified = meta.modified().ok().and_then(|t| t.duration_since(UNIX_EPOCH).ok());
        let etag = format!(
            "\"{:x}-{:x}\"",
            meta.len(),
            modified.map(|d| d.as_nanos()).unwrap_or_default()
        );
        (etag, modified.map(|d| d.as_secs() as i64))
    }

    async fn write_stream(&self, path: &Path, mut stream: ByteStream) -> BlobResult<u64> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.config.max_blob_bytes {
                return Err(BlobError::invalid(format!(
                    "Payload exceeds maximum of {} bytes",
                    self.config.max_blob_bytes
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl ContentStore for FilesystemStore {
    async fn get(&self, id: &ContentId) -> BlobResult<Option<Resource>> {
        let path = self.path_for(id)?;
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let (etag, modified) = Self::etag_for(&meta);
        let mut resource = Resource::new(id.clone(), meta.len(), FileReader { path })
            .with_etag(etag)
            .with_range_support();
        if let Some(secs) = modified {
            resource = resource.with_last_modified(secs);
        }
        Ok(Some(resource))
    }

    async fn put(&self, id: Option<&ContentId>, stream: ByteStream) -> BlobResult<PutResult> {
        let id = match id {
            Some(id) => id.clone(),
            None => ContentId::new(),
        };
        let path = self.path_for(&id)?;
        if self.is_retired(&id).await? {
            return Err(BlobError::retired(id.as_str()));
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let tmp = self.root.join(format!(".{}.{}.tmp", id, Uuid::new_v4().simple()));
        let size_bytes = match self.write_stream(&tmp, stream).await {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&tmp, &path).await?;

        let meta = tokio::fs::metadata(&path).await?;
        let (etag, _) = Self::etag_for(&meta);
        tracing::debug!(content_id = %id, size_bytes, path = %path.display(), "wrote payload");

        Ok(PutResult {
            id,
            size_bytes,
            etag: Some(etag),
        })
    }

    async fn delete(&self, id: &ContentId) -> BlobResult<()> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.marker_for(id), b"").await?;
        tracing::debug!(content_id = %id, "deleted payload");
        Ok(())
    }
}
