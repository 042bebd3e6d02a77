//! Model asset staging
//!
//! Copies the packaged (read-only) model file into writable storage once.

use crate::storage::StorageError;
use std::fs;
use std::path::{Path, PathBuf};

/// Copy `asset` into `dest_dir` unless a non-empty copy is already there.
///
/// Returns the path of the writable copy. Repeated calls are no-ops once the
/// file exists. The copy goes through a temp file so an interrupted copy never
/// leaves a truncated model behind.
pub fn copy_if_absent(asset: &Path, dest_dir: &Path) -> Result<PathBuf, StorageError> {
    let file_name = asset
        .file_name()
        .ok_or_else(|| StorageError::AssetMissing(asset.to_path_buf()))?;
    let output_path = dest_dir.join(file_name);

    if output_path.exists() && fs::metadata(&output_path)?.len() > 0 {
        tracing::debug!("Model already staged: {:?}", output_path);
        return Ok(output_path);
    }

    if !asset.is_file() {
        return Err(StorageError::AssetMissing(asset.to_path_buf()));
    }

    fs::create_dir_all(dest_dir)?;

    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = dest_dir.join(temp_name);

    let copied = fs::copy(asset, &temp_path)?;
    fs::rename(&temp_path, &output_path)?;

    tracing::info!("Staged model asset {:?} ({} bytes)", output_path, copied);
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copies_when_absent() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let asset = src.path().join("model.gguf");
        fs::write(&asset, b"weights").unwrap();

        let staged = copy_if_absent(&asset, &dest.path().join("models")).unwrap();
        assert_eq!(staged, dest.path().join("models").join("model.gguf"));
        assert_eq!(fs::read(&staged).unwrap(), b"weights");
        assert!(!dest.path().join("models").join("model.gguf.tmp").exists());
    }

    #[test]
    fn test_existing_copy_is_kept() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let asset = src.path().join("model.gguf");
        fs::write(&asset, b"new").unwrap();
        fs::write(dest.path().join("model.gguf"), b"old").unwrap();

        let staged = copy_if_absent(&asset, dest.path()).unwrap();
        assert_eq!(fs::read(&staged).unwrap(), b"old");

        // Idempotent
        let again = copy_if_absent(&asset, dest.path()).unwrap();
        assert_eq!(staged, again);
    }

    #[test]
    fn test_missing_asset() {
        let dest = tempfile::tempdir().unwrap();
        let err = copy_if_absent(Path::new("/nonexistent/model.gguf"), dest.path()).unwrap_err();
        assert!(matches!(err, StorageError::AssetMissing(_)));
    }
}
