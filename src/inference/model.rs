//! GGUF model validation
//!
//! Cheap header checks run before handing a file to llama.cpp, so a wrong or
//! truncated file fails with a readable error instead of a native one.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Magic bytes at the start of every GGUF file
pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";

/// Size of the fixed GGUF header (magic, version, tensor count, kv count)
const HEADER_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File too small to be a GGUF model ({0} bytes)")]
    TooSmall(u64),

    #[error("Invalid GGUF magic: {0:02X?}")]
    InvalidMagic([u8; 4]),

    #[error("Unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),
}

/// Header fields read from a GGUF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GgufMetadata {
    pub version: u32,
    pub tensor_count: u64,
    pub metadata_kv_count: u64,
    pub file_size: u64,
}

/// Reads and checks the GGUF header of `path`.
pub fn validate_gguf(path: &Path) -> Result<GgufMetadata, ModelError> {
    if !path.is_file() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }

    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();
    if file_size < HEADER_LEN as u64 {
        return Err(ModelError::TooSmall(file_size));
    }

    let mut header = [0u8; HEADER_LEN];
    file.read_exact(&mut header)?;

    let magic = [header[0], header[1], header[2], header[3]];
    if magic != GGUF_MAGIC {
        return Err(ModelError::InvalidMagic(magic));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    // v1 used 32-bit counts and is no longer loadable by llama.cpp
    if !(2..=3).contains(&version) {
        return Err(ModelError::UnsupportedVersion(version));
    }

    let mut count = [0u8; 8];
    count.copy_from_slice(&header[8..16]);
    let tensor_count = u64::from_le_bytes(count);
    count.copy_from_slice(&header[16..24]);
    let metadata_kv_count = u64::from_le_bytes(count);

    Ok(GgufMetadata {
        version,
        tensor_count,
        metadata_kv_count,
        file_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn header(magic: &[u8; 4], version: u32, tensors: u64, kvs: u64) -> Vec<u8> {
        let mut bytes = magic.to_vec();
        bytes.extend_from_slice(&version.to_le_bytes());
        bytes.extend_from_slice(&tensors.to_le_bytes());
        bytes.extend_from_slice(&kvs.to_le_bytes());
        bytes
    }

    #[test]
    fn test_valid_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.gguf");
        let mut bytes = header(&GGUF_MAGIC, 3, 149, 24);
        bytes.extend_from_slice(&[0u8; 16]);
        fs::write(&path, &bytes).unwrap();

        let meta = validate_gguf(&path).unwrap();
        assert_eq!(meta.version, 3);
        assert_eq!(meta.tensor_count, 149);
        assert_eq!(meta.metadata_kv_count, 24);
        assert_eq!(meta.file_size, 40);
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, header(b"GGML", 3, 0, 0)).unwrap();
        assert!(matches!(
            validate_gguf(&path),
            Err(ModelError::InvalidMagic(m)) if &m == b"GGML"
        ));
    }

    #[test]
    fn test_old_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.gguf");
        fs::write(&path, header(&GGUF_MAGIC, 1, 0, 0)).unwrap();
        assert!(matches!(
            validate_gguf(&path),
            Err(ModelError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn test_truncated_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.gguf");
        fs::write(&path, b"GGUF").unwrap();
        assert!(matches!(validate_gguf(&path), Err(ModelError::TooSmall(4))));
        assert!(matches!(
            validate_gguf(&dir.path().join("absent.gguf")),
            Err(ModelError::NotFound(_))
        ));
    }
}
