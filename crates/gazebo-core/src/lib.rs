//! Gazebo core types, traits, configuration, and errors.
//!
//! This crate provides the building blocks shared by the Gazebo Web
//! infrastructure crates: the [`Resource`] identifier with its key layout,
//! the [`ResourceStorage`] trait, storage configuration, and the error
//! taxonomies for the queue and storage subsystems.

pub mod config;
pub mod error;
pub mod resource;
pub mod storage;

pub use config::{StorageConfig, StorageUri};
pub use error::{InvalidResource, QueueError, StorageError};
pub use resource::Resource;
pub use storage::{DownloadLink, ResourceStorage, LINK_TTL};

/// Convenience Result type using [`StorageError`].
pub type Result<T> = std::result::Result<T, StorageError>;
