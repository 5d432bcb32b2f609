//! HTTP-backed object store.
//!
//! Fetches any reachable URL; uploads and deletes go against a single
//! storage-service base URL with bearer auth.

use super::{ObjectStore, StorageError};
use crate::speech::{NETWORK_TIMEOUT, http_client};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpObjectStore {
    pub fn new(base_url: String, api_key: SecretString) -> Self {
        Self {
            client: http_client(NETWORK_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, bytes: &[u8], key: &str, mime: &str) -> Result<String, StorageError> {
        let url = self.object_url(key);
        let response = self
            .client
            .put(&url)
            .bearer_auth(self.api_key.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Upload(format!(
                "status {} for {}",
                response.status(),
                key
            )));
        }

        debug!(key, bytes = bytes.len(), "uploaded object");
        Ok(url)
    }

    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, StorageError> {
        // The data provider hands over absolute URLs; bare keys resolve
        // against the storage service.
        let url = if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else {
            self.object_url(uri)
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::Fetch(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(uri.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::Fetch(format!(
                "status {} for {}",
                response.status(),
                uri
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| StorageError::Delete(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Delete(format!(
                "status {} for {}",
                response.status(),
                key
            )));
        }
        Ok(())
    }
}
