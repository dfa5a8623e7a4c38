//! Signed-URL broker client.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{error_text, ApiClient, FILES_PATH, UPLOAD_PATH};
use crate::web::dto::{KeyRequest, SignedUrlResponse, WriteLocationRequest};

/// Result type for broker operations.
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Errors signalled by the broker client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached, answered with a non-success status,
    /// or returned a payload without a signed URL.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// A required field was missing; nothing was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A short-lived URL authorizing exactly one read or write.
///
/// Not `Clone`: transfers take it by value, so one location cannot serve
/// two operations.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedLocation {
    url: String,
}

impl SignedLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn into_url(self) -> String {
        self.url
    }
}

/// Issues signed locations for named objects.
#[async_trait]
pub trait SignedUrlBroker: Send + Sync {
    /// Request a location to write a new object named `name`.
    async fn request_write_location(
        &self,
        name: &str,
        mime_type: &str,
    ) -> BrokerResult<SignedLocation>;

    /// Request a location to read the object stored under `key`.
    async fn request_read_location(&self, key: &str) -> BrokerResult<SignedLocation>;
}

/// [`SignedUrlBroker`] backed by the broker HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBroker {
    api: ApiClient,
}

impl HttpBroker {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn issue<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> BrokerResult<SignedLocation> {
        let response = self
            .api
            .send_json(Method::POST, path, Some(body))
            .await
            .map_err(|e| BrokerError::Unavailable(format!("failed to reach broker: {}", e)))?;

        // Check the status before touching the payload.
        if !response.status().is_success() {
            return Err(BrokerError::Unavailable(error_text(response).await));
        }

        let body: SignedUrlResponse = response.json().await.map_err(|e| {
            BrokerError::Unavailable(format!("malformed broker response: {}", e))
        })?;

        if body.signed_url.is_empty() {
            return Err(BrokerError::Unavailable(
                "broker returned an empty signed URL".to_string(),
            ));
        }

        Ok(SignedLocation::new(body.signed_url))
    }
}

#[async_trait]
impl SignedUrlBroker for HttpBroker {
    async fn request_write_location(
        &self,
        name: &str,
        mime_type: &str,
    ) -> BrokerResult<SignedLocation> {
        if name.is_empty() {
            return Err(BrokerError::InvalidRequest(
                "file name must not be empty".to_string(),
            ));
        }

        let request = WriteLocationRequest {
            file_name: name.to_string(),
            file_type: mime_type.to_string(),
        };
        let location = self.issue(UPLOAD_PATH, &request).await?;
        tracing::debug!(name, "write location issued");
        Ok(location)
    }

    async fn request_read_location(&self, key: &str) -> BrokerResult<SignedLocation> {
        if key.is_empty() {
            return Err(BrokerError::InvalidRequest(
                "object key must not be empty".to_string(),
            ));
        }

        let request = KeyRequest {
            key: key.to_string(),
        };
        let location = self.issue(FILES_PATH, &request).await?;
        tracing::debug!(key, "read location issued");
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SharedSession;
    use reqwest::Client;

    fn unreachable_broker() -> HttpBroker {
        HttpBroker::new(ApiClient::with_client(
            Client::new(),
            "http://127.0.0.1:1",
            SharedSession::anonymous(),
        ))
    }

    #[tokio::test]
    async fn test_empty_name_is_invalid_request() {
        let result = unreachable_broker()
            .request_write_location("", "text/plain")
            .await;
        assert!(matches!(result, Err(BrokerError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_empty_key_is_invalid_request() {
        let result = unreachable_broker().request_read_location("").await;
        assert!(matches!(result, Err(BrokerError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_unavailable() {
        let result = unreachable_broker()
            .request_write_location("a.txt", "text/plain")
            .await;
        assert!(matches!(result, Err(BrokerError::Unavailable(_))));
    }

    #[test]
    fn test_signed_location_accessors() {
        let location = SignedLocation::new("https://store/x?sig=1");
        assert_eq!(location.url(), "https://store/x?sig=1");
        assert_eq!(location.into_url(), "https://store/x?sig=1");
    }
}
