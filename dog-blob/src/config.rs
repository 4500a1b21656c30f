/// Configuration shared by the content stores
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Absolute max size allowed for a single payload (safety guard)
    pub max_blob_bytes: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            max_blob_bytes: 5 * 1024 * 1024 * 1024, // 5GB
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max blob size
    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }
}

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
    pub bucket: String,
    pub key_prefix: Option<String>,
    pub force_path_style: bool,
}

impl S3Config {
    /// Read `S3_REGION`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY`,
    /// `S3_BUCKET` and the optional `S3_ENDPOINT_URL` / `S3_KEY_PREFIX`.
    pub fn from_env() -> crate::BlobResult<Self> {
        fn get_env(key: &str) -> crate::BlobResult<String> {
            std::env::var(key)
                .map_err(|_| crate::BlobError::invalid(format!("{} environment variable required", key)))
        }

        let endpoint_url = std::env::var("S3_ENDPOINT_URL").ok();
        Ok(Self {
            region: get_env("S3_REGION")?,
            access_key_id: get_env("S3_ACCESS_KEY_ID")?,
            secret_access_key: get_env("S3_SECRET_ACCESS_KEY")?,
            bucket: get_env("S3_BUCKET")?,
            key_prefix: std::env::var("S3_KEY_PREFIX").ok().filter(|p| !p.is_empty()),
            // Custom endpoints (RustFS, MinIO) need path-style addressing
            force_path_style: endpoint_url.is_some(),
            endpoint_url,
        })
    }

    pub fn object_key(&self, id: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), id),
            None => id.to_string(),
        }
    }
}
