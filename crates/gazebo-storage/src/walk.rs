//! Directory walk shared by every backend's `upload_dir`.
//!
//! [`upload_tree`] checks the source directory, enumerates its regular
//! files and hands each one to a backend-specific [`FileSink`] together with
//! its path relative to the source. Keys always use `/` separators.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tracing::debug;
use walkdir::WalkDir;

use gazebo_core::{Result, StorageError};

/// A regular file found under an upload source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Path relative to the walked directory, `/`-separated.
    pub key: String,
    /// Absolute (or caller-relative) path of the file on disk.
    pub path: PathBuf,
}

/// Backend-specific per-file uploader driven by [`upload_tree`].
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Store `file` under the resource at `relative`.
    async fn put_file(&self, relative: &str, file: File) -> Result<()>;
}

/// Every regular file under `dir`, sorted by path.
///
/// Symlinks are included only when they resolve to a regular file;
/// directories and other special files are skipped. Zero-byte files are
/// included.
pub fn collect_files(dir: &Path) -> Result<Vec<SourceEntry>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            StorageError::backend(format!("Failed to walk {}", dir.display()), e)
        })?;
        let file_type = entry.file_type();
        let is_file = if file_type.is_symlink() {
            std::fs::metadata(entry.path())
                .map(|m| m.is_file())
                .unwrap_or(false)
        } else {
            file_type.is_file()
        };
        if !is_file {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| StorageError::Internal {
                message: format!("Path prefix strip failed: {e}"),
            })?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        files.push(SourceEntry {
            key,
            path: entry.path().to_path_buf(),
        });
    }
    Ok(files)
}

/// Upload every regular file under `source` through `sink`.
///
/// Returns the number of files uploaded. Stops at the first failure without
/// undoing the files already uploaded.
pub async fn upload_tree(source: &Path, sink: &dyn FileSink) -> Result<usize> {
    check_source_dir(source).await?;

    let dir = source.to_path_buf();
    let files = tokio::task::spawn_blocking(move || collect_files(&dir))
        .await
        .map_err(|e| StorageError::Internal {
            message: format!("Blocking task panicked: {e}"),
        })??;
    if files.is_empty() {
        return Err(StorageError::SourceFolderEmpty {
            path: source.to_path_buf(),
        });
    }

    for entry in &files {
        let file = File::open(&entry.path).await.map_err(|e| {
            StorageError::backend(format!("Failed to open {}", entry.path.display()), e)
        })?;
        sink.put_file(&entry.key, file).await?;
        debug!(key = %entry.key, "Uploaded file");
    }
    Ok(files.len())
}

/// Fail unless `source` is an existing directory.
async fn check_source_dir(source: &Path) -> Result<()> {
    match fs::metadata(source).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StorageError::SourceFile {
            path: source.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StorageError::SourceFolderNotFound {
                path: source.to_path_buf(),
            })
        }
        Err(e) => Err(StorageError::backend(
            format!("Failed to stat {}", source.display()),
            e,
        )),
    }
}

/// Fail unless `zip` names an existing regular file.
pub(crate) async fn check_zip_file(zip: &Path) -> Result<()> {
    match fs::metadata(zip).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(StorageError::ZipFileMissing {
            path: zip.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    /// Records what it was handed; fails on a configured key.
    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<(String, Vec<u8>)>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl FileSink for RecordingSink {
        async fn put_file(&self, relative: &str, mut file: File) -> Result<()> {
            if self.fail_on.as_deref() == Some(relative) {
                return Err(StorageError::Backend {
                    message: format!("refusing {relative}"),
                    source: None,
                });
            }
            let mut data = Vec::new();
            file.read_to_end(&mut data).await.unwrap();
            self.seen.lock().unwrap().push((relative.to_string(), data));
            Ok(())
        }
    }

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("meshes/textures")).unwrap();
        std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
        std::fs::write(tmp.path().join("model.sdf"), b"<sdf/>").unwrap();
        std::fs::write(tmp.path().join("meshes/turtle.dae"), b"dae").unwrap();
        std::fs::write(tmp.path().join("meshes/textures/shell.png"), b"").unwrap();
        tmp
    }

    #[test]
    fn test_collect_files_sorted_relative_keys() {
        let tmp = fixture();
        let keys: Vec<String> = collect_files(tmp.path())
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(
            keys,
            vec!["meshes/textures/shell.png", "meshes/turtle.dae", "model.sdf"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_files_symlinks() {
        let tmp = fixture();
        std::os::unix::fs::symlink(tmp.path().join("model.sdf"), tmp.path().join("link.sdf"))
            .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("missing"), tmp.path().join("dangling"))
            .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("meshes"), tmp.path().join("dirlink"))
            .unwrap();
        let keys: Vec<String> = collect_files(tmp.path())
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert!(keys.contains(&"link.sdf".to_string()));
        assert!(!keys.contains(&"dangling".to_string()));
        assert!(!keys.iter().any(|k| k.starts_with("dirlink")));
    }

    #[tokio::test]
    async fn test_upload_tree_hands_every_file() {
        let tmp = fixture();
        let sink = RecordingSink::default();
        let count = upload_tree(tmp.path(), &sink).await.unwrap();
        assert_eq!(count, 3);
        let seen = sink.seen.lock().unwrap();
        assert!(seen.contains(&("meshes/turtle.dae".to_string(), b"dae".to_vec())));
        assert!(seen.contains(&("meshes/textures/shell.png".to_string(), Vec::new())));
    }

    #[tokio::test]
    async fn test_upload_tree_stops_at_first_error() {
        let tmp = fixture();
        let sink = RecordingSink {
            fail_on: Some("meshes/turtle.dae".to_string()),
            ..Default::default()
        };
        let result = upload_tree(tmp.path(), &sink).await;
        assert!(matches!(result, Err(StorageError::Backend { .. })));
        // Files before the failure stay uploaded; files after are never tried.
        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "meshes/textures/shell.png");
    }

    #[tokio::test]
    async fn test_upload_tree_preconditions() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordingSink::default();

        let missing = upload_tree(&tmp.path().join("nope"), &sink).await;
        assert!(matches!(
            missing,
            Err(StorageError::SourceFolderNotFound { .. })
        ));

        std::fs::create_dir_all(tmp.path().join("only/dirs")).unwrap();
        let empty = upload_tree(&tmp.path().join("only"), &sink).await;
        assert!(matches!(empty, Err(StorageError::SourceFolderEmpty { .. })));

        std::fs::write(tmp.path().join("file.txt"), b"x").unwrap();
        let file = upload_tree(&tmp.path().join("file.txt"), &sink).await;
        assert!(matches!(file, Err(StorageError::SourceFile { .. })));
    }

    #[tokio::test]
    async fn test_check_zip_file() {
        let tmp = TempDir::new().unwrap();
        let zip = tmp.path().join("bundle.zip");
        assert!(matches!(
            check_zip_file(&zip).await,
            Err(StorageError::ZipFileMissing { .. })
        ));
        assert!(matches!(
            check_zip_file(tmp.path()).await,
            Err(StorageError::ZipFileMissing { .. })
        ));
        std::fs::write(&zip, b"PK").unwrap();
        check_zip_file(&zip).await.unwrap();
    }
}
