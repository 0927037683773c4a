//! services/portal/src/adapters/storage.rs
//!
//! This module contains the blob-storage adapter, the concrete
//! implementation of the `BlobStore` port against the Firebase Storage
//! REST API.

use crate::adapters::firestore::http_client;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use studyhall_core::ports::{BlobStore, PortError, PortResult};

/// Overall deadline for any single blob request; generous because an upload
/// can carry up to 10 MiB.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A blob-store adapter that implements the `BlobStore` port.
#[derive(Clone)]
pub struct FirebaseStorageAdapter {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl FirebaseStorageAdapter {
    /// Creates a new `FirebaseStorageAdapter` for a storage bucket.
    pub fn new(bucket: String) -> Self {
        Self {
            http: http_client(REQUEST_TIMEOUT),
            base_url: "https://firebasestorage.googleapis.com".to_string(),
            bucket,
        }
    }

    /// Constructor with an explicit endpoint, for emulators.
    pub fn with_base_url(base_url: String, bucket: String) -> Self {
        Self {
            http: http_client(REQUEST_TIMEOUT),
            base_url,
            bucket,
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/v0/b/{}/o/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(path)
        )
    }
}

//=========================================================================================
// `BlobStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl BlobStore for FirebaseStorageAdapter {
    /// Uploads the bytes and returns the durable `alt=media` retrieval URL
    /// carrying the object's download token.
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> PortResult<String> {
        let upload_url = format!(
            "{}/v0/b/{}/o?uploadType=media&name={}",
            self.base_url,
            self.bucket,
            urlencoding::encode(path)
        );
        let response = self
            .http
            .post(&upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Blob upload failed with HTTP {}: {}",
                status, body
            )));
        }

        let metadata: Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let token = metadata
            .get("downloadTokens")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PortError::Unexpected("Upload response carried no download token.".to_string())
            })?;

        Ok(format!(
            "{}?alt=media&token={}",
            self.object_url(path),
            token
        ))
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        let response = self
            .http
            .delete(&self.object_url(path))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(format!("No blob at '{}'.", path)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Blob deletion failed with HTTP {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}
