//! Signed object endpoints: the targets of issued write and read locations.

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::file::{FileObject, SignedMethod, SignedParams};
use crate::transfer::DEFAULT_MIME_TYPE;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Generate a safe Content-Disposition header value for downloads.
///
/// Control characters are dropped, quotes and backslashes replaced, and
/// non-ASCII names carried in the RFC 5987 `filename*` parameter.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized,
        urlencoding::encode(filename)
    )
}

fn require_signature(params: Option<Query<SignedParams>>) -> Result<SignedParams, ApiError> {
    params
        .map(|Query(params)| params)
        .ok_or_else(|| ApiError::forbidden("Missing signature"))
}

/// PUT /objects/*key - Commit an object through a signed write location.
pub async fn put_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    params: Option<Query<SignedParams>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<FileObject>), ApiError> {
    let params = require_signature(params)?;
    state
        .signer
        .verify(SignedMethod::Put, &key, &params)
        .inspect_err(|e| tracing::warn!(key = %key, error = %e, "Rejected signed write"))?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_MIME_TYPE);

    let object = state.store.put(&key, content_type, body).await?;

    tracing::info!(key = %key, bytes = object.size, "Object committed");
    Ok((StatusCode::OK, Json(object)))
}

/// GET /objects/*key - Read an object through a signed read location.
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    params: Option<Query<SignedParams>>,
) -> Result<Response<Body>, ApiError> {
    let params = require_signature(params)?;
    state
        .signer
        .verify(SignedMethod::Get, &key, &params)
        .inspect_err(|e| tracing::warn!(key = %key, error = %e, "Rejected signed read"))?;

    let (content, meta) = state.store.get(&key).await?;
    let file_name = key.rsplit('/').next().unwrap_or(&key);

    Response::builder()
        .header(header::CONTENT_TYPE, meta.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(file_name),
        )
        .header(header::ETAG, format!("\"{}\"", meta.etag))
        .header(header::CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}
