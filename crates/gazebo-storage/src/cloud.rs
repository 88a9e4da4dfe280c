//! Object storage backend for Amazon S3 and Google Cloud Storage.
//!
//! [`CloudStorage`] implements [`ResourceStorage`] on top of the
//! `object_store` crate. Both providers share one code path: the store
//! handles reads and writes, and its [`Signer`] produces pre-signed GET URLs
//! for bundles. Bundles are never produced in the cloud; callers zip locally
//! and upload with [`upload_zip`].
//!
//! [`upload_zip`]: gazebo_core::ResourceStorage::upload_zip

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ObjectStore, PutPayload};
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument};

use gazebo_core::{DownloadLink, Resource, ResourceStorage, Result, StorageError};

use crate::walk::{self, FileSink};

/// A [`ResourceStorage`] backed by a cloud object store.
///
/// Uses the `object_store` crate for transport, with built-in retry logic
/// and connection pooling. A handle is cheap to share between tasks.
#[derive(Debug, Clone)]
pub struct CloudStorage {
    store: Arc<dyn ObjectStore>,
    signer: Arc<dyn Signer>,
    provider: &'static str,
    link_ttl: Duration,
}

impl CloudStorage {
    /// Build from any store and signer pair. `provider` only labels logs.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        signer: Arc<dyn Signer>,
        provider: &'static str,
        link_ttl: Duration,
    ) -> Self {
        Self {
            store,
            signer,
            provider,
            link_ttl,
        }
    }

    /// Connect to an S3 bucket.
    ///
    /// Environment variables `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// and `AWS_REGION` are used as fallbacks for credentials and region.
    /// A custom `endpoint` (MinIO and friends) also allows plain HTTP.
    pub fn s3(
        bucket: &str,
        region: Option<&str>,
        endpoint: Option<&str>,
        link_ttl: Duration,
    ) -> Result<Self> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        let s3 = Arc::new(builder.build().map_err(|e| {
            StorageError::backend(format!("Failed to create S3 client for {bucket}"), e)
        })?);

        debug!(bucket, "S3 storage initialised");
        Ok(Self::new(s3.clone(), s3, "s3", link_ttl))
    }

    /// Connect to a Google Cloud Storage bucket.
    ///
    /// Credentials come from `GOOGLE_SERVICE_ACCOUNT` (or the other
    /// `GOOGLE_*` variables read by the builder). Signing URLs requires a
    /// service account key.
    pub fn gcs(bucket: &str, link_ttl: Duration) -> Result<Self> {
        let gcs = Arc::new(
            GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| {
                    StorageError::backend(format!("Failed to create GCS client for {bucket}"), e)
                })?,
        );

        debug!(bucket, "GCS storage initialised");
        Ok(Self::new(gcs.clone(), gcs, "gcs", link_ttl))
    }

    /// Lifetime of the URLs returned by `download`.
    pub fn link_ttl(&self) -> Duration {
        self.link_ttl
    }

    fn map_store_error(&self, key: &str, op: &str, err: object_store::Error) -> StorageError {
        match err {
            e @ object_store::Error::NotFound { .. } => StorageError::not_found(key, e),
            other => {
                StorageError::backend(format!("{} {op} failed for {key}", self.provider), other)
            }
        }
    }
}

/// Puts uploaded files under `<prefix>/` in the bucket.
struct CloudSink {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    provider: &'static str,
}

#[async_trait]
impl FileSink for CloudSink {
    async fn put_file(&self, relative: &str, mut file: File) -> Result<()> {
        let key = format!("{}/{relative}", self.prefix);
        let mut data = Vec::new();
        file.read_to_end(&mut data).await.map_err(|e| {
            StorageError::backend(format!("Failed to read source for {key}"), e)
        })?;
        self.store
            .put(&ObjectPath::from(key.as_str()), PutPayload::from(data))
            .await
            .map_err(|e| {
                StorageError::backend(format!("{} put failed for {key}", self.provider), e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStorage for CloudStorage {
    #[instrument(skip(self, resource), fields(provider = self.provider, resource = %resource, path = %path))]
    async fn get_file(&self, resource: &Resource, path: &str) -> Result<Bytes> {
        resource.validate()?;
        let key = resource.file_key(path)?;
        let result = self
            .store
            .get(&ObjectPath::from(key.as_str()))
            .await
            .map_err(|e| self.map_store_error(&key, "get", e))?;
        let bytes = result.bytes().await.map_err(|e| {
            StorageError::backend(format!("{} get bytes failed for {key}", self.provider), e)
        })?;
        debug!("Get {} bytes from {}", bytes.len(), key);
        Ok(bytes)
    }

    #[instrument(skip(self, resource), fields(provider = self.provider, resource = %resource))]
    async fn download(&self, resource: &Resource) -> Result<DownloadLink> {
        resource.validate()?;
        let key = resource.zip_key();
        let path = ObjectPath::from(key.as_str());
        self.store
            .head(&path)
            .await
            .map_err(|e| self.map_store_error(&key, "head", e))?;
        let url = self
            .signer
            .signed_url(Method::GET, &path, self.link_ttl)
            .await
            .map_err(|e| {
                StorageError::backend(format!("{} signing failed for {key}", self.provider), e)
            })?;
        debug!(key = %key, ttl_secs = self.link_ttl.as_secs(), "Signed bundle URL");
        Ok(DownloadLink::Url(url.to_string()))
    }

    #[instrument(skip(self, resource), fields(provider = self.provider, resource = %resource, source = %source.display()))]
    async fn upload_dir(&self, resource: &Resource, source: &Path) -> Result<()> {
        resource.validate()?;
        let sink = CloudSink {
            store: Arc::clone(&self.store),
            prefix: resource.prefix(),
            provider: self.provider,
        };
        let files = walk::upload_tree(source, &sink).await?;
        info!(files, "Uploaded directory");
        Ok(())
    }

    #[instrument(skip(self, resource), fields(provider = self.provider, resource = %resource, zip = %zip.display()))]
    async fn upload_zip(&self, resource: &Resource, zip: &Path) -> Result<()> {
        resource.validate()?;
        walk::check_zip_file(zip).await?;
        let data = fs::read(zip).await.map_err(|e| {
            StorageError::backend(format!("Failed to read {}", zip.display()), e)
        })?;
        let key = resource.zip_key();
        let size = data.len();
        self.store
            .put(&ObjectPath::from(key.as_str()), PutPayload::from(data))
            .await
            .map_err(|e| {
                StorageError::backend(format!("{} put failed for {key}", self.provider), e)
            })?;
        info!(key = %key, size, "Uploaded bundle");
        Ok(())
    }
}
