//! Object registry client.
//!
//! The remote store is the source of truth: nothing is cached here, every
//! call goes to the registry.

use std::sync::Arc;

use futures::future::join_all;
use reqwest::Method;
use serde_json::Value;

use super::{error_text, ApiClient, SignedLocation, SignedUrlBroker, FILES_PATH};
use crate::file::FileObject;
use crate::web::dto::KeyRequest;

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Errors signalled by the registry client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No download location could be obtained for the key.
    #[error("failed to resolve download location for {key}: {reason}")]
    ResolveFailed { key: String, reason: String },

    /// The object could not be deleted; it is still listed.
    #[error("failed to delete {key}: {reason}")]
    DeleteFailed { key: String, reason: String },
}

/// Lists, resolves and deletes stored objects.
#[derive(Clone)]
pub struct ObjectRegistry {
    api: ApiClient,
    broker: Arc<dyn SignedUrlBroker>,
}

impl ObjectRegistry {
    pub fn new(api: ApiClient, broker: Arc<dyn SignedUrlBroker>) -> Self {
        Self { api, broker }
    }

    /// Current objects in store order.
    ///
    /// Failures are logged and yield an empty list; callers cannot tell an
    /// unreachable registry from an empty store.
    pub async fn list(&self) -> Vec<FileObject> {
        let response = match self.api.get(FILES_PATH).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch file list");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            let error = error_text(response).await;
            tracing::warn!(%error, "File list request failed");
            return Vec::new();
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "File list response is not JSON");
                return Vec::new();
            }
        };

        parse_listing(body)
    }

    /// Obtain a signed read location for `key`.
    pub async fn resolve_download_location(&self, key: &str) -> RegistryResult<SignedLocation> {
        self.broker
            .request_read_location(key)
            .await
            .map_err(|e| RegistryError::ResolveFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Permanently remove `key`.
    pub async fn delete(&self, key: &str) -> RegistryResult<()> {
        let failed = |reason: String| RegistryError::DeleteFailed {
            key: key.to_string(),
            reason,
        };

        if key.is_empty() {
            return Err(failed("object key must not be empty".to_string()));
        }

        let request = KeyRequest {
            key: key.to_string(),
        };
        let response = self
            .api
            .send_json(Method::DELETE, FILES_PATH, Some(&request))
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(error_text(response).await));
        }

        tracing::info!(key, "Object deleted");
        Ok(())
    }

    /// Delete several keys independently.
    ///
    /// Every key is attempted; results come back in input order.
    pub async fn delete_many(&self, keys: &[String]) -> Vec<(String, RegistryResult<()>)> {
        let results = join_all(keys.iter().map(|key| self.delete(key))).await;
        keys.iter().cloned().zip(results).collect()
    }
}

/// Turn a listing body into objects, skipping entries without a key.
fn parse_listing(body: Value) -> Vec<FileObject> {
    let Value::Array(items) = body else {
        tracing::warn!("File list response is not an array");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<FileObject>(item) {
            Ok(object) => Some(object),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed file list entry");
                None
            }
        })
        .collect()
}
