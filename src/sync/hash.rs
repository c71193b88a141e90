//! Content hashing used to skip copies whose destination is already current.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::SyncError;

/// BLAKE3 digest of an in-memory buffer, as hex.
pub fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// BLAKE3 digest of a file, or `None` when it does not exist.
pub async fn hash_file(path: &Path) -> Result<Option<String>, SyncError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(hash_bytes(&data))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(SyncError::io(path, err)),
    }
}

/// Whether the file at `path` already holds exactly `data`.
pub async fn holds_content(path: &Path, data: &[u8]) -> Result<bool, SyncError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() == data.len() as u64 => {}
        Ok(_) => return Ok(false),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(SyncError::io(path, err)),
    }
    Ok(hash_file(path).await?.as_deref() == Some(hash_bytes(data).as_str()))
}
