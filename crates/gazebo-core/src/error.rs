//! Error taxonomies for the queue and resource storage.
//!
//! Each subsystem has a small, closed set of failure kinds that callers can
//! branch on. Both are defined with `thiserror`; wrapped I/O and transport
//! failures keep the original cause as their `source`.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by the concurrent queue.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The operation requires at least one element.
    #[error("queue is empty")]
    QueueEmpty,

    /// An index, offset or limit falls outside the queue.
    #[error("index out of bounds")]
    IndexOutOfBounds,

    /// The target value is not present in the queue.
    #[error("id not found")]
    IdNotFound,

    /// Both swap endpoints resolve to the same index.
    #[error("swap indexes match")]
    SwapIndexesMatch,

    /// The target is already at the front of the queue.
    #[error("element is already at the front of the queue")]
    MoveIndexFrontPosition,

    /// The target is already at the back of the queue.
    #[error("element is already at the back of the queue")]
    MoveIndexBackPosition,

    /// The listener FIFO is full.
    #[error("too many listeners waiting for the next element")]
    TooManyListeners,
}

/// Why a [`Resource`](crate::Resource) failed validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidResource {
    /// The owner is empty.
    #[error("missing owner")]
    MissingOwner,

    /// The kind is empty.
    #[error("missing kind")]
    MissingKind,

    /// The uuid does not parse, or is not a version 4 UUID.
    #[error("invalid uuid")]
    InvalidUuid,

    /// The version is zero.
    #[error("invalid version")]
    InvalidVersion,

    /// A file path is empty or escapes the resource tree.
    #[error("invalid file path")]
    InvalidPath,
}

/// Failures reported by every [`ResourceStorage`](crate::ResourceStorage) backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The resource failed validation; no I/O was performed.
    #[error("invalid resource format: {0}")]
    ResourceInvalidFormat(#[from] InvalidResource),

    /// The object (or its zip bundle) is absent.
    #[error("resource not found: {key}")]
    ResourceNotFound {
        /// The object key that was not found.
        key: String,
        /// The backend's not-found error, if it produced one.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The upload source directory does not exist.
    #[error("source folder not found: {}", .path.display())]
    SourceFolderNotFound {
        /// The missing source directory.
        path: PathBuf,
    },

    /// The upload source directory holds no regular files.
    #[error("source folder is empty: {}", .path.display())]
    SourceFolderEmpty {
        /// The empty source directory.
        path: PathBuf,
    },

    /// The upload source is a file, not a directory.
    #[error("source is a file, not a folder: {}", .path.display())]
    SourceFile {
        /// The offending source path.
        path: PathBuf,
    },

    /// The zip to upload does not name an existing regular file.
    #[error("zip file missing: {}", .path.display())]
    ZipFileMissing {
        /// The path that was given.
        path: PathBuf,
    },

    /// A backend I/O or transport operation failed.
    #[error("storage backend error: {message}")]
    Backend {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A storage URI or configuration value could not be understood.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// An internal error (bug), such as a panicked blocking task.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Create a backend error from a message and source error.
    pub fn backend(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error that keeps the backend's own error as source.
    pub fn not_found(
        key: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ResourceNotFound {
            key: key.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Map an I/O error to [`StorageError::ResourceNotFound`] when the file is
    /// missing and to [`StorageError::Backend`] otherwise.
    pub fn from_io(key: impl Into<String>, err: std::io::Error) -> Self {
        let key = key.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(key, err)
        } else {
            Self::backend(format!("I/O failed for {key}"), err)
        }
    }

    /// Returns `true` if this is a [`StorageError::ResourceNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }
}
