//! Stored object references.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A reference to an object already committed to the store.
///
/// The wire form follows the store's listing format (`Key`, `Size`,
/// `LastModified`, `ETag`). Members the client does not know about are kept
/// in [`FileObject::extra`] and serialized back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    /// Opaque key assigned by the store.
    #[serde(rename = "Key", alias = "key")]
    pub key: String,
    /// Object size in bytes.
    #[serde(rename = "Size", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last modification time as reported by the store.
    #[serde(
        rename = "LastModified",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<String>,
    /// Entity tag as reported by the store.
    #[serde(rename = "ETag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Other store-provided metadata.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileObject {
    /// Create a reference with only a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            last_modified: None,
            etag: None,
            extra: Map::new(),
        }
    }

    /// The last path segment of the key, which is the uploaded file name.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}
