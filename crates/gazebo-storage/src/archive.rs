//! Zip bundles of resource trees.
//!
//! Bundles are produced locally only. Entries are deflate-compressed, keyed
//! by their `/`-separated path inside the tree, and carry the source file's
//! unix mode bits.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::debug;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use gazebo_core::{Result, StorageError};

use crate::walk::{collect_files, SourceEntry};

/// Mode recorded for entries when the platform has no unix permissions.
#[cfg(not(unix))]
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Write a zip of every regular file under `source` to `dest`.
///
/// The archive is written to a temporary sibling and renamed into place, so
/// `dest` is either absent or complete. Returns the number of entries.
pub fn zip_dir(source: &Path, dest: &Path) -> Result<usize> {
    let files = collect_files(source)?;
    let tmp = dest.with_extension(format!("zip.{}.tmp", Uuid::new_v4().simple()));

    if let Err(e) = write_archive(&files, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, dest).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StorageError::backend(format!("Failed to move bundle to {}", dest.display()), e)
    })?;

    debug!(dest = %dest.display(), entries = files.len(), "Wrote zip bundle");
    Ok(files.len())
}

fn write_archive(files: &[SourceEntry], path: &Path) -> Result<()> {
    let out = File::create(path)
        .map_err(|e| StorageError::backend(format!("Failed to create {}", path.display()), e))?;
    let mut writer = ZipWriter::new(out);

    for entry in files {
        let mut src = File::open(&entry.path).map_err(|e| {
            StorageError::backend(format!("Failed to open {}", entry.path.display()), e)
        })?;
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(file_mode(&src)?);
        writer
            .start_file(entry.key.as_str(), options)
            .map_err(|e| StorageError::backend(format!("Failed to add {}", entry.key), e))?;
        io::copy(&mut src, &mut writer)
            .map_err(|e| StorageError::backend(format!("Failed to compress {}", entry.key), e))?;
    }

    writer
        .finish()
        .map_err(|e| StorageError::backend(format!("Failed to finish {}", path.display()), e))?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(file: &File) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;

    let meta = file
        .metadata()
        .map_err(|e| StorageError::backend("Failed to read file mode", e))?;
    Ok(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_file: &File) -> Result<u32> {
    Ok(DEFAULT_FILE_MODE)
}
