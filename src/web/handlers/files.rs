//! Broker endpoints: listing, signed location issuing and deletion.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::file::{FileObject, ObjectStore, SignedMethod};
use crate::web::dto::{
    has_control_chars, DeleteResponse, KeyRequest, SignedUrlResponse, ValidatedJson,
    WriteLocationRequest,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /api/files - List committed objects.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FileObject>>, ApiError> {
    let objects = state.store.list().await?;
    Ok(Json(objects))
}

/// POST /api/upload - Issue a write location for a new object.
pub async fn request_upload(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<WriteLocationRequest>,
) -> Result<Json<SignedUrlResponse>, ApiError> {
    if has_control_chars(&req.file_name) {
        return Err(ApiError::bad_request("File name contains control characters"));
    }

    let key = ObjectStore::generate_key(&req.file_name);
    let signed_url = state.signer.sign(SignedMethod::Put, &key);

    tracing::info!(key = %key, file_type = %req.file_type, "Write location issued");
    Ok(Json(SignedUrlResponse { signed_url }))
}

/// POST /api/files - Issue a read location for an existing object.
pub async fn request_download(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<KeyRequest>,
) -> Result<Json<SignedUrlResponse>, ApiError> {
    if !state.store.exists(&req.key).await {
        return Err(ApiError::not_found("Object not found"));
    }

    let signed_url = state.signer.sign(SignedMethod::Get, &req.key);

    tracing::debug!(key = %req.key, "Read location issued");
    Ok(Json(SignedUrlResponse { signed_url }))
}

/// DELETE /api/files - Permanently remove an object.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<KeyRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    // Keys this store could never have issued are simply unknown.
    if !state.store.exists(&req.key).await || !state.store.delete(&req.key).await? {
        return Err(ApiError::not_found("Object not found"));
    }

    tracing::info!(key = %req.key, "Object deleted");
    Ok(Json(DeleteResponse {
        key: req.key,
        deleted: true,
    }))
}
