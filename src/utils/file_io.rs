use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;
use tracing::error;

use crate::Result;
use crate::StorageError;

/// Recursively removes a directory.
///
/// Returns `Ok(false)` if there was nothing to remove. A regular file at
/// `path` is rejected rather than deleted.
pub async fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) if !metadata.is_dir() => {
            return Err(StorageError::InvalidLocation(format!("{} is not a directory", path.display())).into());
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(?path, "Nothing to remove");
            return Ok(false);
        }
        Err(e) => {
            return Err(StorageError::PathError {
                path: path.to_path_buf(),
                source: e,
            }
            .into());
        }
    }

    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        // Raced with another remover
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => {
            error!("Failed to remove {:?}: {:?}", path, e);
            Err(StorageError::PathError {
                path: path.to_path_buf(),
                source: e,
            }
            .into())
        }
    }
}
