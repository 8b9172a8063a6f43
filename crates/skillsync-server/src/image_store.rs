//! Filesystem store for review and profile images.
//!
//! Images are content-addressed: the key is the hex BLAKE3 hash of the
//! bytes, so uploading the same picture twice yields the same key and a
//! single file. Keys are validated as 64 lowercase hex characters before they
//! ever touch a path, which rules out traversal.

use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct ImageStore {
    base_path: PathBuf,
    max_size: usize,
}

impl ImageStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::ImageStorage(format!(
                "Failed to create image directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Image store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Store `data` and return its key.
    pub async fn put_image(&self, data: &[u8]) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty image".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::ImageTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let key = blake3::hash(data).to_hex().to_string();
        let path = self.image_path(&key)?;

        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!(key = %key, "Image already stored");
            return Ok(key);
        }

        fs::write(&path, data).await.map_err(|e| {
            ServerError::ImageStorage(format!("Failed to write image {}: {}", key, e))
        })?;

        debug!(key = %key, size = data.len(), "Stored image");
        Ok(key)
    }

    pub async fn get_image(&self, key: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.image_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServerError::NotFound("Image not found".to_string()))
            }
            Err(e) => Err(ServerError::ImageStorage(format!(
                "Failed to read image {}: {}",
                key, e
            ))),
        }
    }

    /// Delete an image. Returns `false` if it was already gone.
    pub async fn delete_image(&self, key: &str) -> Result<bool, ServerError> {
        let path = self.image_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Deleted image");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServerError::ImageStorage(format!(
                "Failed to delete image {}: {}",
                key, e
            ))),
        }
    }

    fn image_path(&self, key: &str) -> Result<PathBuf, ServerError> {
        if !is_valid_key(key) {
            return Err(ServerError::BadRequest(format!("Invalid image key: {key}")));
        }
        Ok(self.base_path.join(key))
    }
}

/// 64 lowercase hex characters, the shape of a BLAKE3 key.
pub(crate) fn is_valid_key(key: &str) -> bool {
    key.len() == 64
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (ImageStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf(), 1024).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _dir) = test_store().await;
        let key = store.put_image(b"png-bytes").await.unwrap();
        assert_eq!(key.len(), 64);
        assert_eq!(store.get_image(&key).await.unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_same_content_same_key() {
        let (store, _dir) = test_store().await;
        let a = store.put_image(b"same").await.unwrap();
        let b = store.put_image(b"same").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _dir) = test_store().await;
        let key = store.put_image(b"delete-me").await.unwrap();

        assert!(store.delete_image(&key).await.unwrap());
        assert!(!store.delete_image(&key).await.unwrap());
        assert!(matches!(
            store.get_image(&key).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_bad_keys() {
        let (store, _dir) = test_store().await;
        let upper = "G".repeat(64);
        for key in ["../etc/passwd", "abc", upper.as_str()] {
            assert!(matches!(
                store.get_image(key).await,
                Err(ServerError::BadRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_size_limits() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.put_image(b"").await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store.put_image(&vec![0u8; 2048]).await,
            Err(ServerError::ImageTooLarge { size: 2048, max: 1024 })
        ));
    }
}
