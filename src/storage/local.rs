//! Directory-backed object store.

use super::{ObjectStore, StorageError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for_key(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, bytes: &[u8], key: &str, _mime: &str) -> Result<String, StorageError> {
        let path = self.path_for_key(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Upload(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        debug!(key, bytes = bytes.len(), "stored object locally");
        Ok(path.to_string_lossy().into_owned())
    }

    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, StorageError> {
        // URIs from this store are plain paths; keys from the data provider
        // may be relative to the root.
        let path = Path::new(uri);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.path_for_key(uri)
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(uri.to_string()))
            }
            Err(e) => Err(StorageError::Fetch(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        tokio::fs::remove_file(self.path_for_key(key))
            .await
            .map_err(|e| StorageError::Delete(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_fetch_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf()).unwrap();

        let uri = store
            .upload(b"audio-bytes", "user_voices/test.wav", "audio/wav")
            .await
            .unwrap();

        let fetched = store.fetch(&uri).await.unwrap();
        assert_eq!(fetched, b"audio-bytes");

        // Relative keys resolve against the root too.
        let by_key = store.fetch("user_voices/test.wav").await.unwrap();
        assert_eq!(by_key, b"audio-bytes");

        store.delete("user_voices/test.wav").await.unwrap();
        assert!(matches!(
            store.fetch("user_voices/test.wav").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
