//! Object store client.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Upload seam used by the pipeline, so stage logic can be tested against a
/// fake store.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload every file under `local_dir` (recursively) below `prefix`,
    /// preserving relative paths. Returns the uploaded keys.
    async fn upload_directory(&self, local_dir: &Path, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Ranged-read seam used by the multipart downloader.
#[async_trait]
pub trait RangeFetch: Send + Sync {
    /// Object content length from a metadata probe.
    async fn head_size(&self, key: &str) -> StorageResult<u64>;

    /// Stream the inclusive byte range `[start, end]` of `key` into `dest`.
    async fn download_range(&self, key: &str, start: u64, end: u64, dest: &Path)
        -> StorageResult<()>;
}

/// Client for an S3-compatible object store.
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from environment configuration.
    ///
    /// `S3_BUCKET` names the bucket; `S3_ENDPOINT_URL` optionally points at
    /// an S3-compatible endpoint (MinIO, R2), in which case path-style
    /// addressing is used. `S3_ACCESS_KEY_ID`/`S3_SECRET_ACCESS_KEY` take
    /// precedence over the ambient AWS credential chain.
    pub async fn from_env() -> StorageResult<Self> {
        let bucket = std::env::var("S3_BUCKET")
            .map_err(|_| StorageError::Request("S3_BUCKET not set".to_string()))?;

        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);

        if let (Ok(access_key), Ok(secret_key)) = (
            std::env::var("S3_ACCESS_KEY_ID"),
            std::env::var("S3_SECRET_ACCESS_KEY"),
        ) {
            builder = builder
                .credentials_provider(Credentials::new(access_key, secret_key, None, None, "env"));
        }
        if let Ok(region) = std::env::var("S3_REGION") {
            builder = builder.region(Region::new(region));
        }
        if let Ok(endpoint) = std::env::var("S3_ENDPOINT_URL") {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        Ok(Self::new(client, bucket))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Probe object metadata for the content length.
    pub async fn head_size(&self, key: &str) -> StorageResult<u64> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(StorageError::request)?;

        match head.content_length() {
            Some(len) if len > 0 => Ok(len as u64),
            _ => Err(StorageError::SizeUnknown(key.to_string())),
        }
    }

    /// Stream the inclusive byte range `[start, end]` of `key` into `dest`.
    pub async fn download_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
        dest: &Path,
    ) -> StorageResult<()> {
        let range = format!("bytes={start}-{end}");
        debug!(key, %range, "fetching object range");

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(range)
            .send()
            .await
            .map_err(StorageError::request)?;

        let mut body = object.body;
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = body.try_next().await.map_err(StorageError::request)? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }

    /// Upload a single local file to `key`.
    pub async fn upload_file(&self, local: &Path, key: &str) -> StorageResult<String> {
        let body = ByteStream::from_path(local)
            .await
            .map_err(StorageError::request)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(local))
            .body(body)
            .send()
            .await
            .map_err(StorageError::request)?;

        debug!(key, "uploaded file");
        Ok(key.to_string())
    }
}

#[async_trait]
impl RangeFetch for ObjectStore {
    async fn head_size(&self, key: &str) -> StorageResult<u64> {
        ObjectStore::head_size(self, key).await
    }

    async fn download_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
        dest: &Path,
    ) -> StorageResult<()> {
        ObjectStore::download_range(self, key, start, end, dest).await
    }
}

#[async_trait]
impl ArtifactStore for ObjectStore {
    async fn upload_directory(&self, local_dir: &Path, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![local_dir.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let relative = path
                    .strip_prefix(local_dir)
                    .map_err(|e| StorageError::Request(e.to_string()))?;
                let key = format!("{}/{}", prefix.trim_end_matches('/'), join_key(relative));
                self.upload_file(&path, &key).await?;
                keys.push(key);
            }
        }

        info!(
            prefix,
            count = keys.len(),
            "uploaded directory to object store"
        );
        Ok(keys)
    }
}

/// Build a forward-slash object key from a relative path.
fn join_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("vtt") => "text/vtt",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}
