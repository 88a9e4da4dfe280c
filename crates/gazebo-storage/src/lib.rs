//! Resource storage backends for Gazebo Web services.
//!
//! This crate provides concrete implementations of the
//! [`ResourceStorage`](gazebo_core::ResourceStorage) trait:
//!
//! - [`LocalStorage`]: filesystem-backed storage with on-demand zip bundles
//! - [`CloudStorage`]: S3 or GCS via `object_store`, with pre-signed URLs
//!
//! The [`walk`] and [`archive`] modules hold the directory-walk and zip
//! primitives the backends share. [`open_storage`] picks a backend from a
//! [`StorageConfig`].

pub mod archive;
pub mod cloud;
pub mod local;
pub mod walk;

use std::sync::Arc;

use tracing::info;

use gazebo_core::{ResourceStorage, Result, StorageConfig, StorageUri};

pub use cloud::CloudStorage;
pub use local::LocalStorage;

/// Open the backend named by `config.uri`.
pub async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn ResourceStorage>> {
    let storage: Arc<dyn ResourceStorage> = match StorageUri::parse(&config.uri)? {
        StorageUri::Local(path) => Arc::new(LocalStorage::new(path).await?),
        StorageUri::S3 {
            bucket,
            region,
            endpoint,
        } => Arc::new(CloudStorage::s3(
            &bucket,
            region.as_deref(),
            endpoint.as_deref(),
            config.link_ttl,
        )?),
        StorageUri::Gcs { bucket } => Arc::new(CloudStorage::gcs(&bucket, config.link_ttl)?),
    };

    info!(uri = %config.uri, "Resource storage opened");
    Ok(storage)
}
