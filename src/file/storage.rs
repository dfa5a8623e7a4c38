//! Local-disk object store.
//!
//! Each object lives in its own directory named after the UUID half of its
//! key:
//! ```text
//! {base_path}/
//! ├── 3f0c1e6a-.../
//! │   ├── report.pdf
//! │   └── .meta.json
//! └── ...
//! ```
//! An object becomes visible once its metadata file exists; both files are
//! written to a temporary name first and renamed into place.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

use super::FileObject;
use crate::{FileDeckError, Result};

const META_FILE: &str = ".meta.json";

/// Longest stored file name, in characters.
pub const MAX_STORED_NAME_LENGTH: usize = 200;

/// Metadata kept next to each object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeta {
    pub key: String,
    pub content_type: String,
    pub size: u64,
    /// Hex SHA-256 of the content.
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

impl StoredMeta {
    fn to_object(&self) -> FileObject {
        let mut object = FileObject::new(self.key.clone());
        object.size = Some(self.size);
        object.last_modified = Some(self.last_modified.to_rfc3339());
        object.etag = Some(format!("\"{}\"", self.etag));
        object
    }
}

/// Object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    base_path: PathBuf,
}

impl ObjectStore {
    /// Open the store, creating the base directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Allocate a fresh key for an upload named `file_name`.
    ///
    /// Keys are `{uuid}/{sanitized name}`, so two uploads of the same name
    /// never collide and an object is never overwritten.
    pub fn generate_key(file_name: &str) -> String {
        format!("{}/{}", Uuid::new_v4(), Self::sanitize_name(file_name))
    }

    /// Make a client-supplied file name safe to use as a path segment.
    pub fn sanitize_name(file_name: &str) -> String {
        let base = file_name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(file_name);

        let cleaned: String = base
            .chars()
            .map(|c| if c.is_control() { '_' } else { c })
            .collect();
        let cleaned = cleaned.trim().trim_start_matches('.').trim();

        if cleaned.is_empty() {
            return "file".to_string();
        }
        cleaned.chars().take(MAX_STORED_NAME_LENGTH).collect()
    }

    /// Check that `key` is one this store could have issued.
    pub fn validate_key(key: &str) -> Result<()> {
        let invalid = || FileDeckError::Validation(format!("invalid object key: {key}"));

        let (id, name) = key.split_once('/').ok_or_else(invalid)?;
        Uuid::parse_str(id).map_err(|_| invalid())?;
        if name.is_empty() || Self::sanitize_name(name) != name {
            return Err(invalid());
        }
        Ok(())
    }

    fn object_dir(&self, key: &str) -> PathBuf {
        let id = key.split('/').next().unwrap_or(key);
        self.base_path.join(id)
    }

    fn object_paths(&self, key: &str) -> (PathBuf, PathBuf, PathBuf) {
        let dir = self.object_dir(key);
        let name = key.split_once('/').map(|(_, n)| n).unwrap_or(key);
        let data = dir.join(name);
        let meta = dir.join(META_FILE);
        (dir, data, meta)
    }

    /// Store `content` under `key`.
    pub async fn put(&self, key: &str, content_type: &str, content: Bytes) -> Result<FileObject> {
        Self::validate_key(key)?;
        let (dir, data_path, meta_path) = self.object_paths(key);

        if fs::try_exists(&meta_path).await? {
            return Err(FileDeckError::Conflict(format!("object {key}")));
        }
        fs::create_dir_all(&dir).await?;

        let meta = StoredMeta {
            key: key.to_string(),
            content_type: content_type.to_string(),
            size: content.len() as u64,
            etag: hex::encode(Sha256::digest(&content)),
            last_modified: Utc::now(),
        };
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| FileDeckError::Storage(format!("failed to encode metadata: {e}")))?;

        write_atomic(&dir, &data_path, &content).await?;
        write_atomic(&dir, &meta_path, &meta_json).await?;

        tracing::debug!(key, bytes = meta.size, "Object stored");
        Ok(meta.to_object())
    }

    /// Read the object and its metadata.
    pub async fn get(&self, key: &str) -> Result<(Bytes, StoredMeta)> {
        Self::validate_key(key)?;
        let (_, data_path, meta_path) = self.object_paths(key);

        let meta = read_meta(&meta_path)
            .await?
            .ok_or_else(|| FileDeckError::NotFound(format!("Object {key}")))?;
        let content = match fs::read(&data_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FileDeckError::NotFound(format!("Object {key}")));
            }
            Err(e) => return Err(e.into()),
        };

        Ok((Bytes::from(content), meta))
    }

    /// Remove the object.
    ///
    /// Returns `false` if it didn't exist.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        Self::validate_key(key)?;
        if !self.exists(key).await {
            return Ok(false);
        }

        match fs::remove_dir_all(self.object_dir(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        if Self::validate_key(key).is_err() {
            return false;
        }
        let (_, _, meta_path) = self.object_paths(key);
        fs::try_exists(meta_path).await.unwrap_or(false)
    }

    /// All committed objects, ordered by key.
    pub async fn list(&self) -> Result<Vec<FileObject>> {
        let mut objects = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let dir_name = entry.file_name();
            let Some(dir_name) = dir_name.to_str() else {
                continue;
            };
            if Uuid::parse_str(dir_name).is_err() {
                continue;
            }

            match read_meta(&entry.path().join(META_FILE)).await {
                Ok(Some(meta)) => objects.push(meta.to_object()),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(dir = dir_name, error = %e, "Skipping unreadable object");
                }
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

async fn read_meta(path: &Path) -> Result<Option<StoredMeta>> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| FileDeckError::Storage(format!("corrupt metadata {}: {e}", path.display())))
}

async fn write_atomic(dir: &Path, target: &Path, content: &[u8]) -> Result<()> {
    let temp = dir.join(format!(".tmp-{}", Uuid::new_v4()));
    if let Err(e) = fs::write(&temp, content).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp, target).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}
