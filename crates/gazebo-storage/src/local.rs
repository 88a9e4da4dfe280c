//! Filesystem-backed resource storage.
//!
//! [`LocalStorage`] keeps resources under a base directory using the shared
//! key layout. Zip bundles are produced on the first [`download`] of a
//! resource and cached next to its tree as `<prefix>.zip`.
//!
//! [`download`]: gazebo_core::ResourceStorage::download

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use gazebo_core::{DownloadLink, Resource, ResourceStorage, Result, StorageError};

use crate::archive;
use crate::walk::{self, FileSink};

/// Mode of directories created under the base directory.
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// A [`ResourceStorage`] backed by the local filesystem.
///
/// All keys are mapped to paths under the configured `base_dir`. Parent
/// directories are created on write with mode `0755`; files inherit the
/// process umask.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new `LocalStorage` rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        create_dirs(&base_dir).await?;
        debug!(base_dir = %base_dir.display(), "LocalStorage initialised");
        Ok(Self { base_dir })
    }

    /// Return the full filesystem path for a storage key.
    fn key_to_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }

    /// Return the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Drop a cached bundle so the next download reflects the current tree.
    async fn discard_bundle(&self, resource: &Resource) {
        let path = self.key_to_path(&resource.zip_key());
        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Discarded stale bundle"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to discard stale bundle"),
        }
    }
}

/// Writes uploaded files under `<base_dir>/<prefix>/`.
struct LocalSink {
    root: PathBuf,
}

#[async_trait]
impl FileSink for LocalSink {
    async fn put_file(&self, relative: &str, mut file: File) -> Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            create_dirs(parent).await?;
        }
        let mut out = File::create(&path).await.map_err(|e| {
            StorageError::backend(format!("Failed to create {}", path.display()), e)
        })?;
        tokio::io::copy(&mut file, &mut out).await.map_err(|e| {
            StorageError::backend(format!("Failed to write {}", path.display()), e)
        })?;
        out.flush().await.map_err(|e| {
            StorageError::backend(format!("Failed to flush {}", path.display()), e)
        })?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStorage for LocalStorage {
    #[instrument(skip(self, resource), fields(resource = %resource, path = %path))]
    async fn get_file(&self, resource: &Resource, path: &str) -> Result<Bytes> {
        resource.validate()?;
        let key = resource.file_key(path)?;
        let data = fs::read(self.key_to_path(&key))
            .await
            .map_err(|e| StorageError::from_io(&key, e))?;
        debug!("Get {} bytes from {}", data.len(), key);
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self, resource), fields(resource = %resource))]
    async fn download(&self, resource: &Resource) -> Result<DownloadLink> {
        resource.validate()?;
        let zip_key = resource.zip_key();
        let zip_path = self.key_to_path(&zip_key);
        let cached = fs::try_exists(&zip_path)
            .await
            .map_err(|e| StorageError::from_io(&zip_key, e))?;
        if cached {
            debug!(key = %zip_key, "Serving cached bundle");
            return Ok(DownloadLink::Path(zip_path));
        }

        let prefix = resource.prefix();
        let tree = self.key_to_path(&prefix);
        match fs::metadata(&tree).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(StorageError::ResourceNotFound {
                    key: prefix,
                    source: None,
                })
            }
            Err(e) => return Err(StorageError::from_io(prefix, e)),
        }

        let dest = zip_path.clone();
        let entries = tokio::task::spawn_blocking(move || archive::zip_dir(&tree, &dest))
            .await
            .map_err(|e| StorageError::Internal {
                message: format!("Blocking task panicked: {e}"),
            })??;
        info!(key = %zip_key, entries, "Bundle created");
        Ok(DownloadLink::Path(zip_path))
    }

    #[instrument(skip(self, resource), fields(resource = %resource, source = %source.display()))]
    async fn upload_dir(&self, resource: &Resource, source: &Path) -> Result<()> {
        resource.validate()?;
        let sink = LocalSink {
            root: self.key_to_path(&resource.prefix()),
        };
        self.discard_bundle(resource).await;
        let files = walk::upload_tree(source, &sink).await?;
        info!(files, "Uploaded directory");
        Ok(())
    }

    #[instrument(skip(self, resource), fields(resource = %resource, zip = %zip.display()))]
    async fn upload_zip(&self, resource: &Resource, zip: &Path) -> Result<()> {
        resource.validate()?;
        walk::check_zip_file(zip).await?;
        let key = resource.zip_key();
        let dest = self.key_to_path(&key);
        if let Some(parent) = dest.parent() {
            create_dirs(parent).await?;
        }
        let size = fs::copy(zip, &dest).await.map_err(|e| {
            StorageError::backend(format!("Failed to copy bundle to {}", dest.display()), e)
        })?;
        info!(key = %key, size, "Uploaded bundle");
        Ok(())
    }
}

/// Recursively create `dir`, using [`DIR_MODE`] on unix.
async fn create_dirs(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder.create(dir).await.map_err(|e| {
        StorageError::backend(format!("Failed to create directory {}", dir.display()), e)
    })
}
