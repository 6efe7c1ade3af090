//! Copy and delete primitives for local trees.
//!
//! Blocking calls run on tokio's blocking pool; each public operation is
//! wrapped in the caller's [`RetryPolicy`].

use std::fs::{self, File};
use std::io;
use std::path::Path;

use super::retry::RetryPolicy;
use crate::error::MirrorError;

/// Copy a whole file over `dst`, creating parent directories as needed.
/// The replica file takes the source modification time and permissions.
/// Returns the number of bytes copied.
pub async fn copy_file(src: &Path, dst: &Path, retry: &RetryPolicy) -> Result<u64, MirrorError> {
    retry
        .run(|| {
            let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
            blocking(move || copy_file_local(&src, &dst))
        })
        .await
        .map_err(|e| MirrorError::from_io_error(e, "copying to", Some(dst.to_path_buf())))
}

/// Delete a single file. A file that is already gone counts as deleted
/// and yields `false`.
pub async fn delete_file(path: &Path, retry: &RetryPolicy) -> Result<bool, MirrorError> {
    retry
        .run(|| {
            let path = path.to_path_buf();
            blocking(move || ignore_missing(fs::remove_file(&path)))
        })
        .await
        .map_err(|e| MirrorError::from_io_error(e, "deleting file", Some(path.to_path_buf())))
}

/// Delete a directory and everything below it. A directory that is
/// already gone yields `false`.
pub async fn delete_dir(path: &Path, retry: &RetryPolicy) -> Result<bool, MirrorError> {
    retry
        .run(|| {
            let path = path.to_path_buf();
            blocking(move || ignore_missing(fs::remove_dir_all(&path)))
        })
        .await
        .map_err(|e| MirrorError::from_io_error(e, "deleting directory", Some(path.to_path_buf())))
}

/// Create a directory (and parents) if absent. Returns `true` if it had
/// to be created.
pub async fn ensure_dir(path: &Path) -> Result<bool, MirrorError> {
    if tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(false);
    }
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| MirrorError::from_io_error(e, "creating directory", Some(path.to_path_buf())))?;
    Ok(true)
}

fn copy_file_local(src: &Path, dst: &Path) -> io::Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut reader = File::open(src)?;
    let source_meta = reader.metadata()?;
    prepare_target(dst)?;

    let mut writer = File::create(dst)?;
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.set_modified(source_meta.modified()?)?;
    drop(writer);

    // Permissions last, so a read-only source does not lock the handle above
    fs::set_permissions(dst, source_meta.permissions())?;
    Ok(bytes)
}

/// Make an existing `dst` safe to overwrite: a symlink is removed rather
/// than written through, a read-only file is made writable again.
fn prepare_target(dst: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(dst) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if meta.file_type().is_symlink() {
        return ignore_missing(fs::remove_file(dst)).map(|_| ());
    }

    let mut permissions = meta.permissions();
    if permissions.readonly() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            permissions.set_mode(permissions.mode() | 0o200);
        }
        #[cfg(not(unix))]
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);

        fs::set_permissions(dst, permissions)?;
    }
    Ok(())
}

fn ignore_missing(result: io::Result<()>) -> io::Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(io::Error::other)?
}
