use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};

use crate::memory_store::collect_limited;
use crate::{
    bytes_stream, BlobConfig, BlobError, BlobResult, ByteStream, ContentId, ContentStore, PutResult,
    Resource, ResourceReader, ResolvedRange, S3Config,
};

/// Content store backed by any S3-compatible object storage (AWS, RustFS, MinIO).
///
/// Deleting an id writes an empty tombstone object under `.retired/` in the
/// key prefix; `put` refuses ids that have one.
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    config: S3Config,
    limits: BlobConfig,
}

struct S3Reader {
    client: Client,
    bucket: String,
    key: String,
}

#[async_trait]
impl ResourceReader for S3Reader {
    async fn read(&self, range: Option<&ResolvedRange>) -> BlobResult<ByteStream> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(&self.key);
        if let Some(r) = range {
            request = request.range(format!("bytes={}-{}", r.start, r.end));
        }

        let result = request.send().await.map_err(BlobError::backend)?;
        let body = result.body.collect().await.map_err(BlobError::backend)?;
        Ok(bytes_stream(body.into_bytes()))
    }
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config, limits: BlobConfig) -> Self {
        let client = Self::create_client(&config).await;
        tracing::info!(bucket = %config.bucket, prefix = ?config.key_prefix, "S3 content store ready");
        Self {
            client,
            config,
            limits,
        }
    }

    async fn create_client(config: &S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "dog-blob",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.force_path_style)
                .build(),
        )
    }

    fn key_for(&self, id: &ContentId) -> BlobResult<String> {
        id.validate()?;
        Ok(self.config.object_key(id.as_str()))
    }

    fn tombstone_key(&self, id: &ContentId) -> String {
        self.config.object_key(&format!(".retired/{id}"))
    }

    async fn is_retired(&self, id: &ContentId) -> BlobResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(self.tombstone_key(id))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map_or(false, |se| se.is_not_found()) => Ok(false),
            Err(e) => Err(BlobError::backend(e)),
        }
    }
}

#[async_trait]
impl ContentStore for S3CompatibleStore {
    async fn get(&self, id: &ContentId) -> BlobResult<Option<Resource>> {
        let key = self.key_for(id)?;
        let head = match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(head) => head,
            Err(e) if e.as_service_error().map_or(false, |se| se.is_not_found()) => return Ok(None),
            Err(e) => return Err(BlobError::backend(e)),
        };

        let size_bytes = head.content_length().unwrap_or(0).max(0) as u64;
        let reader = S3Reader {
            client: self.client.clone(),
            bucket: self.config.bucket.clone(),
            key,
        };
        let mut resource = Resource::new(id.clone(), size_bytes, reader).with_range_support();
        if let Some(etag) = head.e_tag() {
            resource = resource.with_etag(etag);
        }
        if let Some(ct) = head.content_type() {
            resource = resource.with_content_type(ct);
        }
        if let Some(modified) = head.last_modified() {
            resource = resource.with_last_modified(modified.secs());
        }
        Ok(Some(resource))
    }

    async fn put(&self, id: Option<&ContentId>, stream: ByteStream) -> BlobResult<PutResult> {
        let id = match id {
            Some(id) => id.clone(),
            None => ContentId::new(),
        };
        let key = self.key_for(&id)?;
        if self.is_retired(&id).await? {
            return Err(BlobError::retired(id.as_str()));
        }

        let data = collect_limited(stream, self.limits.max_blob_bytes).await?;
        let size_bytes = data.len() as u64;

        let result = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(AwsByteStream::from(data))
            .send()
            .await
            .map_err(BlobError::backend)?;
        tracing::debug!(content_id = %id, size_bytes, key = %key, "uploaded payload");

        Ok(PutResult {
            id,
            size_bytes,
            etag: result.e_tag().map(|s| s.to_string()),
        })
    }

    async fn delete(&self, id: &ContentId) -> BlobResult<()> {
        let key = self.key_for(id)?;
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
            .map_err(BlobError::backend)?;
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(self.tombstone_key(id))
            .body(AwsByteStream::from_static(b""))
            .send()
            .await
            .map_err(BlobError::backend)?;
        tracing::debug!(content_id = %id, key = %key, "deleted payload");
        Ok(())
    }
}
