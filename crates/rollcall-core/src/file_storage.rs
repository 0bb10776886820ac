//! File storage abstraction for uploaded evidence documents.
//!
//! Services only see [`FileStorage`]; the server wires in
//! [`LocalFileStorage`] rooted at the configured upload directory. Keys are
//! relative paths such as `leave-requests/<uuid>.pdf`.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;
use tokio::fs;

pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Extensions accepted for leave-request evidence.
pub const EVIDENCE_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Default upload limit (5 MiB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

pub trait FileStorage: Send + Sync {
    /// Store `content` under `key` and return the key.
    fn save<'a>(&'a self, key: &'a str, content: &'a [u8]) -> StorageFuture<'a, String>;

    /// Read the bytes stored under `key`.
    fn read<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Vec<u8>>;

    /// Delete the file under `key`. Missing files are not an error.
    fn delete<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()>;

    /// Largest accepted upload in bytes.
    fn max_file_size(&self) -> usize;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File exceeds maximum size of {max_bytes} bytes")]
    InvalidFileSize { max_bytes: usize },

    #[error("File type '{received}' not allowed. Allowed types: {}", .allowed.join(", "))]
    InvalidFileType {
        received: String,
        allowed: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found")]
    NotFound,

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Returns the lowercased extension of `filename` if it is one of `allowed`.
pub fn validate_extension(filename: &str, allowed: &[&str]) -> Result<String, StorageError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if allowed.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(StorageError::InvalidFileType {
            received: if ext.is_empty() {
                filename.to_string()
            } else {
                ext
            },
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Best-effort MIME type for a stored key, used when streaming files back.
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
    max_file_size: usize,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self::with_max_size(base_dir, DEFAULT_MAX_FILE_SIZE)
    }

    pub fn with_max_size(base_dir: PathBuf, max_file_size: usize) -> Self {
        Self {
            base_dir,
            max_file_size,
        }
    }

    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.starts_with('\\')
        {
            return Err(StorageError::InvalidKey(
                "Key must not be empty, contain '..', or start with a separator".to_string(),
            ));
        }

        if !key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '/' || c == '.')
        {
            return Err(StorageError::InvalidKey(
                "Key contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }
}

impl FileStorage for LocalFileStorage {
    fn save<'a>(&'a self, key: &'a str, content: &'a [u8]) -> StorageFuture<'a, String> {
        Box::pin(async move {
            Self::validate_key(key)?;

            if content.len() > self.max_file_size {
                return Err(StorageError::InvalidFileSize {
                    max_bytes: self.max_file_size,
                });
            }

            let file_path = self.base_dir.join(key);
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&file_path, content).await?;

            Ok(key.to_string())
        })
    }

    fn read<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Vec<u8>> {
        Box::pin(async move {
            Self::validate_key(key)?;

            match fs::read(self.base_dir.join(key)).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            Self::validate_key(key)?;

            match fs::remove_file(self.base_dir.join(key)).await {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn max_file_size(&self) -> usize {
        self.max_file_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage(max: usize) -> LocalFileStorage {
        let dir = std::env::temp_dir().join(format!("rollcall-storage-{}", uuid::Uuid::new_v4()));
        LocalFileStorage::with_max_size(dir, max)
    }

    #[test]
    fn test_validate_key_accepts_valid_keys() {
        assert!(LocalFileStorage::validate_key("leave-requests/abc-123.pdf").is_ok());
        assert!(LocalFileStorage::validate_key("leave-requests/scan_1.png").is_ok());
    }

    #[test]
    fn test_validate_key_rejects_traversal_and_absolute_paths() {
        assert!(LocalFileStorage::validate_key("../../../etc/passwd").is_err());
        assert!(LocalFileStorage::validate_key("/etc/passwd").is_err());
        assert!(LocalFileStorage::validate_key("\\windows\\system32").is_err());
        assert!(LocalFileStorage::validate_key("").is_err());
    }

    #[test]
    fn test_validate_extension() {
        assert_eq!(
            validate_extension("note.PDF", EVIDENCE_EXTENSIONS).unwrap(),
            "pdf"
        );
        assert_eq!(
            validate_extension("scan.jpeg", EVIDENCE_EXTENSIONS).unwrap(),
            "jpeg"
        );
        assert!(matches!(
            validate_extension("virus.exe", EVIDENCE_EXTENSIONS),
            Err(StorageError::InvalidFileType { .. })
        ));
        assert!(validate_extension("noextension", EVIDENCE_EXTENSIONS).is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a/b.pdf"), "application/pdf");
        assert_eq!(content_type_for("a/b.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a/b"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_save_read_delete() {
        let storage = temp_storage(1024);

        let key = storage
            .save("leave-requests/doc.pdf", b"%PDF-1.4")
            .await
            .unwrap();
        assert_eq!(storage.read(&key).await.unwrap(), b"%PDF-1.4");

        storage.delete(&key).await.unwrap();
        assert!(matches!(
            storage.read(&key).await,
            Err(StorageError::NotFound)
        ));

        // deleting twice is fine
        storage.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_oversized_file() {
        let storage = temp_storage(4);
        let result = storage.save("leave-requests/big.pdf", b"12345").await;
        assert!(matches!(
            result,
            Err(StorageError::InvalidFileSize { max_bytes: 4 })
        ));
    }
}
