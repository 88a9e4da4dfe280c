//! The ResourceStorage trait, the single interface for resource trees.
//!
//! Implementations include the local filesystem backend and the object
//! store backend (S3, GCS). They share validation, key derivation and the
//! directory-walk upload, so callers see identical semantics everywhere.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::resource::Resource;
use crate::Result;

/// Default lifetime of a pre-signed download URL: 60 minutes.
pub const LINK_TTL: Duration = Duration::from_secs(60 * 60);

/// Where a resource's zip bundle can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadLink {
    /// A pre-signed URL, valid for the backend's link TTL.
    Url(String),
    /// A path to a zip file on the local filesystem.
    Path(PathBuf),
}

impl fmt::Display for DownloadLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadLink::Url(url) => f.write_str(url),
            DownloadLink::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Uniform access to version-addressed resource trees and their bundles.
///
/// Every method validates the resource first and returns
/// [`StorageError::ResourceInvalidFormat`](crate::StorageError::ResourceInvalidFormat)
/// without any I/O when it is malformed. Implementations must be
/// `Send + Sync` so one handle can be shared across tasks.
///
/// Dropping a returned future cancels the operation's pending I/O.
#[async_trait]
pub trait ResourceStorage: Send + Sync {
    /// Read `<prefix>/<path>` fully into memory.
    async fn get_file(&self, resource: &Resource, path: &str) -> Result<Bytes>;

    /// Return a link to the resource's `<prefix>.zip` bundle.
    async fn download(&self, resource: &Resource) -> Result<DownloadLink>;

    /// Upload every regular file under `source`, keyed by its path relative
    /// to `source`. Stops at the first failing file; earlier files stay.
    async fn upload_dir(&self, resource: &Resource, source: &Path) -> Result<()>;

    /// Upload the zip file at `zip` as the resource's bundle.
    async fn upload_zip(&self, resource: &Resource, zip: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_link_display() {
        let url = DownloadLink::Url("https://bucket/a.zip?sig=1".into());
        assert_eq!(url.to_string(), "https://bucket/a.zip?sig=1");
        let path = DownloadLink::Path(PathBuf::from("/data/a.zip"));
        assert_eq!(path.to_string(), "/data/a.zip");
    }
}
