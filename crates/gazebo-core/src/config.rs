//! Storage configuration and backend selection.
//!
//! [`StorageConfig`] names a backend by URI. [`StorageUri::parse`] turns the
//! URI into the backend to build:
//!
//! - `local://<path>` or a bare path: local filesystem rooted at `<path>`
//! - `s3://<bucket>?region=<r>&endpoint=<url>`: Amazon S3 or compatible
//! - `gs://<bucket>` (or `gcs://<bucket>`): Google Cloud Storage

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::LINK_TTL;
use crate::Result;

/// Configuration for a resource storage handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend URI, e.g. `"local://~/.gazebo/resources"` or `"s3://bucket"`.
    pub uri: String,

    /// Lifetime of pre-signed download URLs (cloud backends only).
    #[serde(default = "default_link_ttl")]
    pub link_ttl: Duration,
}

fn default_link_ttl() -> Duration {
    LINK_TTL
}

impl StorageConfig {
    /// Create a config for `uri` with the default link TTL.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            link_ttl: LINK_TTL,
        }
    }

    /// Override the pre-signed URL lifetime.
    pub fn with_link_ttl(mut self, link_ttl: Duration) -> Self {
        self.link_ttl = link_ttl;
        self
    }
}

/// A parsed storage URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageUri {
    /// Local filesystem rooted at the given directory.
    Local(PathBuf),
    /// An S3 bucket, with optional region and custom endpoint (MinIO etc.).
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
    },
    /// A Google Cloud Storage bucket.
    Gcs { bucket: String },
}

impl StorageUri {
    /// Parse a storage URI. Anything without a known scheme is a local path.
    pub fn parse(uri: &str) -> Result<Self> {
        if let Some(rest) = uri.strip_prefix("s3://") {
            return Ok(StorageUri::S3 {
                bucket: parse_bucket(uri, rest)?,
                region: extract_query_param(uri, "region"),
                endpoint: extract_query_param(uri, "endpoint"),
            });
        }
        if let Some(rest) = uri
            .strip_prefix("gs://")
            .or_else(|| uri.strip_prefix("gcs://"))
        {
            return Ok(StorageUri::Gcs {
                bucket: parse_bucket(uri, rest)?,
            });
        }

        let path = uri.strip_prefix("local://").unwrap_or(uri);
        if path.is_empty() {
            return Err(StorageError::Config {
                message: format!("local storage URI must include a path: {uri}"),
            });
        }
        let expanded = if let Some(rest) = path
            .strip_prefix("~/")
            .or_else(|| path.strip_prefix("~\\"))
        {
            let home = home_dir().ok_or_else(|| StorageError::Config {
                message: "Cannot determine home directory".to_string(),
            })?;
            home.join(rest)
        } else {
            PathBuf::from(path)
        };
        Ok(StorageUri::Local(expanded))
    }
}

/// Take the bucket out of `<bucket>[/...][?query]`.
fn parse_bucket(uri: &str, rest: &str) -> Result<String> {
    let path_part = rest.split('?').next().unwrap_or(rest);
    let bucket = path_part.split('/').next().unwrap_or("");
    if bucket.is_empty() {
        return Err(StorageError::Config {
            message: format!("storage URI must include a bucket name: {uri}"),
        });
    }
    Ok(bucket.to_string())
}

/// Extract a query parameter value from a URI.
fn extract_query_param(uri: &str, param: &str) -> Option<String> {
    let query = uri.split('?').nth(1)?;
    for pair in query.split('&') {
        let mut kv = pair.splitn(2, '=');
        if kv.next()? == param {
            return kv.next().map(|v| v.to_string());
        }
    }
    None
}

/// Best-effort home directory detection.
fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
