//! Temp-file-then-rename commits
//!
//! Output is written to a uniquely named temporary file in the destination
//! directory, forced to disk, and only then renamed over the final name. The
//! rename is the single point at which the file becomes visible. If anything
//! fails before it, the temporary file is removed when it is dropped.

use crate::error::ExtractionError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

/// Atomically replace `dest` with `bytes`
///
/// The temporary file is named `.<dest file name>.<random><temp_suffix>` and
/// lives next to `dest`, so the rename never crosses a filesystem boundary.
/// When `sync_dir` is set, the parent directory is fsynced after the rename so
/// the new directory entry is durable too (unix only; failure is logged).
///
/// Returns the number of bytes committed.
pub(crate) fn write_file(
    dest: &Path,
    bytes: &[u8],
    temp_suffix: &str,
    sync_dir: bool,
) -> Result<u64, ExtractionError> {
    let dir = parent_dir(dest);
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ExtractionError::WriteFailed {
            path: dest.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
        })?;

    let mut temp = create_temp(&dir, &file_name, temp_suffix).map_err(|e| {
        ExtractionError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        }
    })?;
    let temp_path = temp.path().to_path_buf();
    debug!(?temp_path, ?dest, len = bytes.len(), "writing temporary output");

    temp.write_all(bytes)
        .and_then(|()| temp.flush())
        .map_err(|e| ExtractionError::WriteFailed {
            path: temp_path.clone(),
            source: e,
        })?;

    temp.as_file()
        .sync_all()
        .map_err(|e| ExtractionError::SyncFailed {
            path: temp_path.clone(),
            source: e,
        })?;

    // The PersistError hands the temp file back; dropping it deletes it.
    temp.persist(dest)
        .map_err(|e| ExtractionError::RenameFailed {
            source_path: temp_path,
            dest_path: dest.to_path_buf(),
            source: e.error,
        })?;

    if sync_dir {
        sync_directory(&dir);
    }

    Ok(bytes.len() as u64)
}

fn create_temp(dir: &Path, file_name: &str, temp_suffix: &str) -> std::io::Result<NamedTempFile> {
    let prefix = format!(".{}.", file_name);
    let mut builder = Builder::new();
    builder.prefix(&prefix).suffix(temp_suffix);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }

    builder.tempfile_in(dir)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(unix)]
fn sync_directory(dir: &Path) {
    if let Err(e) = std::fs::File::open(dir).and_then(|d| d.sync_all()) {
        warn!(?dir, error = %e, "failed to sync output directory");
    }
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) {}
