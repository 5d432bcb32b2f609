//! Object-storage collaborator.
//!
//! The pipeline fetches existing message audio and cloning references, and
//! uploads per-job custom voice samples. Storage is a capability trait with a
//! local-directory implementation and an HTTP one.

mod http;
mod local;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("delete failed: {0}")]
    Delete(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `key`; returns the URI the object is reachable at.
    async fn upload(&self, bytes: &[u8], key: &str, mime: &str) -> Result<String, StorageError>;

    /// Fetch an object by the URI `upload` returned (or any URI the data
    /// provider handed over).
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage key for a per-job custom voice upload.
pub fn user_voice_key(extension: &str) -> String {
    format!("user_voices/{}.{}", uuid::Uuid::new_v4().simple(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_voice_keys_are_unique() {
        let a = user_voice_key("wav");
        let b = user_voice_key("wav");
        assert!(a.starts_with("user_voices/"));
        assert!(a.ends_with(".wav"));
        assert_ne!(a, b);
    }
}
