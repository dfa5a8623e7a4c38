//! Request DTOs for the broker API.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// POST /api/upload - request a signed write location.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WriteLocationRequest {
    /// Name of the file about to be uploaded.
    #[serde(rename = "fileName")]
    #[validate(length(
        min = 1,
        max = 255,
        message = "File name must be between 1 and 255 characters"
    ))]
    pub file_name: String,
    /// MIME type of the file (advisory).
    #[serde(rename = "fileType", default)]
    pub file_type: String,
}

/// POST /api/files (read location) and DELETE /api/files.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KeyRequest {
    /// Object key.
    #[validate(length(
        min = 1,
        max = 512,
        message = "Key must be between 1 and 512 characters"
    ))]
    pub key: String,
}
