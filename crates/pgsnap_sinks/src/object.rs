//! Upload of committed snapshots to an S3-compatible bucket (MinIO, S3).

use crate::error::{SinkError, SinkResult};
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::{BackoffConfig, ObjectStore, RetryConfig};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Connection settings for an S3-compatible endpoint.
#[derive(Clone)]
pub struct ObjectStoreSettings {
    /// `host[:port]`, or a full `http(s)://` URL.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub secure: bool,
    pub region: String,
    pub max_retries: usize,
}

impl ObjectStoreSettings {
    /// Endpoint as a URL; a bare host gets a scheme from `secure`.
    pub fn endpoint_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.contains("://") {
            endpoint.to_string()
        } else if self.secure {
            format!("https://{}", endpoint)
        } else {
            format!("http://{}", endpoint)
        }
    }
}

impl std::fmt::Debug for ObjectStoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("bucket", &self.bucket)
            .field("secure", &self.secure)
            .field("region", &self.region)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// A file that landed in the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedObject {
    pub bucket: String,
    pub key: String,
    pub bytes: u64,
}

impl UploadedObject {
    /// `bucket/key`, the form printed to the console.
    pub fn location(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

/// Blocking facade over an async object store.
///
/// Export is synchronous (one DuckDB connection, one table at a time), so the
/// sink owns a current-thread runtime and drives each request to completion.
pub struct ObjectSink {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    runtime: tokio::runtime::Runtime,
}

impl ObjectSink {
    /// Build an S3 client for `settings` (path-style addressing).
    pub fn connect(settings: &ObjectStoreSettings) -> SinkResult<Self> {
        let retry = RetryConfig {
            backoff: BackoffConfig::default(),
            max_retries: settings.max_retries,
            retry_timeout: Duration::from_secs(60),
        };
        let store = AmazonS3Builder::new()
            .with_endpoint(settings.endpoint_url())
            .with_bucket_name(&settings.bucket)
            .with_access_key_id(&settings.access_key)
            .with_secret_access_key(&settings.secret_key)
            .with_region(&settings.region)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(!settings.secure)
            .with_retry(retry)
            .build()
            .map_err(|e| SinkError::Config(e.to_string()))?;

        debug!(settings = ?settings, "Configured object store client");
        Self::from_store(Arc::new(store), &settings.bucket)
    }

    /// Wrap an existing store (in-memory, local, or another cloud).
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: &str) -> SinkResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SinkError::io("Failed to start object store runtime", "", e))?;
        Ok(Self {
            store,
            bucket: bucket.to_string(),
            runtime,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Fail unless the bucket is reachable and listable. A bucket the server
    /// reports as absent is `BucketMissing`; anything else (refused
    /// connection, bad credentials) is `BucketUnreachable`.
    pub fn ensure_bucket(&self) -> SinkResult<()> {
        let store = Arc::clone(&self.store);
        let result = self
            .runtime
            .block_on(async move { store.list_with_delimiter(None).await });
        match result {
            Ok(_) => {
                info!(bucket = %self.bucket, "Bucket is reachable");
                Ok(())
            }
            Err(e) if is_missing_bucket(&e) => {
                warn!(bucket = %self.bucket, error = %e, "Bucket does not exist");
                Err(SinkError::BucketMissing(self.bucket.clone()))
            }
            Err(e) => {
                warn!(bucket = %self.bucket, error = %e, "Bucket check failed");
                Err(SinkError::BucketUnreachable {
                    bucket: self.bucket.clone(),
                    source: e,
                })
            }
        }
    }

    /// Stream a local file to `key`.
    pub fn upload_file(&self, local: &Path, key: &str) -> SinkResult<UploadedObject> {
        let location = ObjectPath::parse(key)
            .map_err(|e| SinkError::Config(format!("invalid object key '{}': {}", key, e)))?;
        let store = Arc::clone(&self.store);

        let bytes = self.runtime.block_on(async {
            let mut file = tokio::fs::File::open(local)
                .await
                .map_err(|e| SinkError::io("Failed to open snapshot for upload", local, e))?;
            let mut writer = BufWriter::new(store, location);
            let copied = match tokio::io::copy(&mut file, &mut writer).await {
                Ok(copied) => copied,
                Err(e) => {
                    let _ = writer.abort().await;
                    return Err(SinkError::io("Failed to upload snapshot", local, e));
                }
            };
            writer
                .shutdown()
                .await
                .map_err(|e| SinkError::io("Failed to finish upload", local, e))?;
            Ok::<u64, SinkError>(copied)
        })?;

        info!(
            "Uploaded {} -> {}/{} ({} bytes)",
            local.display(),
            self.bucket,
            key,
            bytes
        );
        Ok(UploadedObject {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            bytes,
        })
    }
}

/// S3 answers a listing of an absent bucket with `NoSuchBucket`, which the
/// S3 client surfaces as a generic error rather than `NotFound`.
fn is_missing_bucket(err: &object_store::Error) -> bool {
    match err {
        object_store::Error::NotFound { .. } => true,
        other => other.to_string().contains("NoSuchBucket"),
    }
}
