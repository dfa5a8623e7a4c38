//! HTTP clients for the broker API.
//!
//! [`ApiClient`] carries the base URL, timeouts and the injected session;
//! [`HttpBroker`] and [`ObjectRegistry`] build the domain calls on top of it.

mod broker;
mod registry;

pub use broker::{BrokerError, BrokerResult, HttpBroker, SignedLocation, SignedUrlBroker};
pub use registry::{ObjectRegistry, RegistryError, RegistryResult};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;

use crate::config::ClientConfig;
use crate::session::SessionProvider;
use crate::{FileDeckError, Result};

/// Path of the upload (write location) endpoint.
pub const UPLOAD_PATH: &str = "/api/upload";

/// Path of the files (list / read location / delete) endpoint.
pub const FILES_PATH: &str = "/api/files";

/// HTTP client for the broker API, bound to a session.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl ApiClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FileDeckError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, &config.base_url, session))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(
        client: Client,
        base_url: &str,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.build_url(path));
        match self.session.current().and_then(|s| s.access_token) {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request with an optional JSON body.
    ///
    /// The status is not inspected; callers decide what counts as success.
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> reqwest::Result<Response> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await
    }

    /// GET request without a body.
    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.request(Method::GET, path).send().await
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Read the body of a failed response for error messages.
pub(crate) async fn error_text(response: Response) -> String {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if text.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SharedSession;

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let api = ApiClient::with_client(
            Client::new(),
            "http://club.example.org/",
            SharedSession::anonymous(),
        );
        assert_eq!(api.base_url(), "http://club.example.org");
        assert_eq!(
            api.build_url(FILES_PATH),
            "http://club.example.org/api/files"
        );
    }

    #[test]
    fn test_debug_omits_session() {
        let api = ApiClient::with_client(Client::new(), "http://x", SharedSession::anonymous());
        let debug = format!("{api:?}");
        assert!(debug.contains("http://x"));
    }
}
