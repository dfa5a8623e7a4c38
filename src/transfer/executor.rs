//! Byte transfer against signed locations.
//!
//! A transfer is a single `PUT` of the whole file to a signed write location.
//! The body is streamed in chunks so progress can be reported as the
//! transport pulls data, and the request is raced against a [`CancelToken`]
//! so an abort takes effect whether or not any bytes have gone out yet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};

use super::{CancelToken, FileSource};
use crate::client::SignedLocation;
use crate::config::ClientConfig;
use crate::{FileDeckError, Result};

/// Result type for transfer operations.
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Terminal failure of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The cancellation token fired before the transfer settled.
    #[error("transfer cancelled")]
    Cancelled,

    /// The remote endpoint answered with a non-success status.
    #[error("remote rejected transfer with status {0}")]
    RemoteRejected(u16),

    /// The request could not be completed at the network level.
    #[error("network failure: {0}")]
    NetworkFailure(String),
}

/// Progress callback, invoked with the completed percentage (0.0 to 100.0).
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// A progress callback that discards every update.
pub fn ignore_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// Percentage of `total` covered by `done`, clamped to [0, 100].
///
/// Returns `None` when the total is unknown or zero.
pub fn progress_fraction(done: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((done as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}

/// Performs the bytes-on-the-wire part of an upload.
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Write the full content of `source` to `destination`.
    ///
    /// The location is consumed: a signed location serves one transfer.
    async fn execute(
        &self,
        source: &FileSource,
        destination: SignedLocation,
        on_progress: ProgressFn,
        cancel: &CancelToken,
    ) -> TransferResult<()>;
}

/// [`TransferExecutor`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransferExecutor {
    client: Client,
    chunk_size: usize,
}

impl HttpTransferExecutor {
    /// Create an executor from the client configuration.
    ///
    /// Only the connect timeout applies: a slow transfer is ended by the
    /// transport or by cancellation, never by a total deadline.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FileDeckError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config.chunk_size_bytes))
    }

    /// Create an executor around an existing client.
    pub fn with_client(client: Client, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Download the object behind a signed read location.
    ///
    /// Progress is reported only when the response announces its length.
    pub async fn fetch(
        &self,
        source: SignedLocation,
        on_progress: ProgressFn,
        cancel: &CancelToken,
    ) -> TransferResult<Bytes> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let download = async {
            let response = self
                .client
                .get(source.url())
                .send()
                .await
                .map_err(network_failure)?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransferError::RemoteRejected(status.as_u16()));
            }

            let total = response.content_length();
            let mut received: u64 = 0;
            let mut buffer = BytesMut::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
            let mut stream = response.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(network_failure)?;
                received += chunk.len() as u64;
                buffer.extend_from_slice(&chunk);
                if let Some(fraction) = total.and_then(|t| progress_fraction(received, t)) {
                    on_progress(fraction);
                }
            }

            Ok(buffer.freeze())
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("download cancelled");
                Err(TransferError::Cancelled)
            }
            result = download => result,
        }
    }
}

#[async_trait]
impl TransferExecutor for HttpTransferExecutor {
    async fn execute(
        &self,
        source: &FileSource,
        destination: SignedLocation,
        on_progress: ProgressFn,
        cancel: &CancelToken,
    ) -> TransferResult<()> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let total = source.len();
        let body = Body::wrap_stream(chunked_body(
            source.content().clone(),
            self.chunk_size,
            on_progress.clone(),
        ));

        let request = self
            .client
            .put(destination.url())
            .header(CONTENT_TYPE, source.mime_type())
            .header(CONTENT_LENGTH, total)
            .body(body);

        tracing::debug!(name = source.name(), bytes = total, "starting transfer");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(name = source.name(), "transfer cancelled");
                return Err(TransferError::Cancelled);
            }
            result = request.send() => result.map_err(network_failure)?,
        };

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(name = source.name(), %status, "transfer rejected");
            return Err(TransferError::RemoteRejected(status.as_u16()));
        }

        // An empty body never yields a chunk.
        if total == 0 {
            on_progress(100.0);
        }

        Ok(())
    }
}

fn network_failure(e: reqwest::Error) -> TransferError {
    TransferError::NetworkFailure(e.to_string())
}

/// Split `content` into a stream of chunks, reporting progress as each one
/// is handed to the transport.
fn chunked_body(
    content: Bytes,
    chunk_size: usize,
    on_progress: ProgressFn,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static {
    let total = content.len();
    let chunk_size = chunk_size.max(1);
    let mut offset = 0usize;

    futures::stream::iter(std::iter::from_fn(move || {
        if offset >= total {
            return None;
        }
        let end = (offset + chunk_size).min(total);
        let chunk = content.slice(offset..end);
        offset = end;
        if let Some(fraction) = progress_fraction(end as u64, total as u64) {
            on_progress(fraction);
        }
        Some(Ok(chunk))
    }))
}
