use async_trait::async_trait;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, S3Config};

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("duplicate")]
    Duplicate,
    #[error("not_found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

/// Content-addressed blob store keyed by lowercase SHA-256 hex.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn save(&self, hash: &str, mime: &str, bytes: &[u8]) -> Result<(), MediaStoreError>;
    async fn load(&self, hash: &str) -> Result<(Vec<u8>, String), MediaStoreError>;
    /// Mime type of a stored object without fetching the whole body.
    async fn stat(&self, hash: &str) -> Result<String, MediaStoreError>;
}

pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn sniff(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".into())
}

// ---------------- Filesystem implementation ----------------
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, hash: &str) -> Result<PathBuf, MediaStoreError> {
        // Only well-formed digests reach the filesystem.
        if !is_valid_hash(hash) {
            return Err(MediaStoreError::NotFound);
        }
        Ok(self.root.join(&hash[0..2]).join(hash))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn save(&self, hash: &str, _mime: &str, bytes: &[u8]) -> Result<(), MediaStoreError> {
        let path = self.path_for(hash)?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(MediaStoreError::Duplicate);
        }
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| MediaStoreError::Other(e.to_string()))?;
        }
        // Write then rename so readers never see a partial file.
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes).await.map_err(|e| {
            error!("writing media {hash} failed: {e}");
            MediaStoreError::Other(e.to_string())
        })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| MediaStoreError::Other(e.to_string()))
    }

    async fn load(&self, hash: &str) -> Result<(Vec<u8>, String), MediaStoreError> {
        let path = self.path_for(hash)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let mime = sniff(&bytes);
                Ok((bytes, mime))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaStoreError::NotFound),
            Err(e) => Err(MediaStoreError::Other(e.to_string())),
        }
    }

    async fn stat(&self, hash: &str) -> Result<String, MediaStoreError> {
        use tokio::io::AsyncReadExt;
        let path = self.path_for(hash)?;
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(MediaStoreError::NotFound),
            Err(e) => return Err(MediaStoreError::Other(e.to_string())),
        };
        // Enough for every signature `infer` checks on our allowed types.
        let mut head = vec![0u8; 8192];
        let n = file
            .read(&mut head)
            .await
            .map_err(|e| MediaStoreError::Other(e.to_string()))?;
        Ok(sniff(&head[..n]))
    }
}

// ---------------- S3 implementation (MinIO compatible) ----------------
pub struct S3MediaStore {
    bucket: String,
    client: aws_sdk_s3::Client,
    prefix: String,
}

impl S3MediaStore {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(cfg.region.clone()))
            .endpoint_url(cfg.endpoint.clone());
        if !cfg.access_key.is_empty() && !cfg.secret_key.is_empty() {
            let creds = Credentials::new(cfg.access_key.clone(), cfg.secret_key.clone(), None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // MinIO without wildcard DNS needs path-style addressing.
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf).force_path_style(true).build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("Initialized S3/MinIO media client for bucket '{}'", cfg.bucket);

        let bucket = cfg.bucket.clone();
        if let Err(e) = client.head_bucket().bucket(&bucket).send().await {
            warn!("head_bucket failed for '{bucket}' (will attempt create): {e:?}");
            let max_attempts = 8u32;
            for attempt in 1..=max_attempts {
                match client.create_bucket().bucket(&bucket).send().await {
                    Ok(_) => {
                        info!("created bucket '{bucket}' (attempt {attempt})");
                        break;
                    }
                    Err(e2) if attempt == max_attempts => {
                        error!("create_bucket failed for '{bucket}' after {attempt} attempts: {e2:?}");
                        return Err(anyhow::anyhow!("failed to ensure bucket '{bucket}': {e2}"));
                    }
                    Err(e2) => {
                        let backoff_ms = 200 * u64::from(attempt.pow(2));
                        warn!("create_bucket attempt {attempt} failed for '{bucket}': {e2:?} (retrying in {backoff_ms}ms)");
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        }

        Ok(Self { bucket, client, prefix: "media".into() })
    }

    fn key_for(&self, hash: &str) -> Result<String, MediaStoreError> {
        if !is_valid_hash(hash) {
            return Err(MediaStoreError::NotFound);
        }
        Ok(format!("{}/{}/{}", self.prefix, &hash[0..2], hash))
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn save(&self, hash: &str, mime: &str, bytes: &[u8]) -> Result<(), MediaStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        let key = self.key_for(hash)?;
        if self.client.head_object().bucket(&self.bucket).key(&key).send().await.is_ok() {
            return Err(MediaStoreError::Duplicate);
        }
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(mime);
        if let Err(e) = put.send().await {
            error!("put_object failed hash={hash} key={key} bucket={} err={:?}", self.bucket, e);
            let hint = if e.to_string().contains("AccessDenied") {
                " (check S3_ACCESS_KEY/S3_SECRET_KEY permissions)"
            } else {
                ""
            };
            return Err(MediaStoreError::Other(format!("{e}{hint}")));
        }
        Ok(())
    }

    async fn load(&self, hash: &str) -> Result<(Vec<u8>, String), MediaStoreError> {
        let key = self.key_for(hash)?;
        let obj = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|_| MediaStoreError::NotFound)?;
        let data = obj.body.collect().await.map_err(|e| MediaStoreError::Other(e.to_string()))?;
        let bytes = Vec::from(data.into_bytes().as_ref());
        let mime = sniff(&bytes);
        Ok((bytes, mime))
    }

    async fn stat(&self, hash: &str) -> Result<String, MediaStoreError> {
        let key = self.key_for(hash)?;
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|_| MediaStoreError::NotFound)?;
        Ok(head.content_type().unwrap_or("application/octet-stream").to_string())
    }
}

/// S3 when `S3_ENDPOINT` is configured, otherwise the local media dir.
pub async fn build_media_store(cfg: &Config) -> anyhow::Result<Arc<dyn MediaStore>> {
    match cfg.s3 {
        Some(ref s3) => Ok(Arc::new(S3MediaStore::new(s3).await?)),
        None => {
            let store = FsMediaStore::new(&cfg.media_dir)?;
            info!("Serving media from {}", store.root().display());
            Ok(Arc::new(store))
        }
    }
}
