//! Local file data selected for upload.

use std::path::Path;

use bytes::Bytes;

use crate::{FileDeckError, Result};

/// MIME type used when none can be determined.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// The file a user picked: name, MIME type and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    name: String,
    mime_type: String,
    content: Bytes,
}

impl FileSource {
    /// Create a source with an explicit MIME type.
    ///
    /// An empty MIME type falls back to [`DEFAULT_MIME_TYPE`].
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        let mime_type = mime_type.into();
        Self {
            name: name.into(),
            mime_type: if mime_type.is_empty() {
                DEFAULT_MIME_TYPE.to_string()
            } else {
                mime_type
            },
            content: content.into(),
        }
    }

    /// Create a source, guessing the MIME type from the name's extension.
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self::new(name, mime_type, content)
    }

    /// Read a local file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                FileDeckError::Validation(format!("not a file path: {}", path.display()))
            })?
            .to_string();

        let content = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(name, content))
    }

    /// File name as selected.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type sent as the transfer's `Content-Type`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// File content.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Byte length.
    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
