//! Response DTOs for the broker API.

use serde::{Deserialize, Serialize};

/// Signed location issued by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUrlResponse {
    /// One-time URL.
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
}

/// DELETE /api/files response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Key that was removed.
    pub key: String,
    /// Always true on a 200 response.
    pub deleted: bool,
}
