use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::domain::PhotoSlot;
use crate::config::StorageConfig;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Clone, PartialEq, Eq)]
pub struct UploadObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl std::fmt::Debug for UploadObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadObject")
            .field("key", &self.key)
            .field("bytes", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object key '{0}' is not a safe relative path")]
    InvalidKey(String),
    #[error("unable to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Remote object store for finished photos. Each call either returns a
/// durable URL or fails on its own; callers do not retry.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, object: UploadObject) -> Result<String, StorageError>;
}

static OBJECT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// `inspections/<location>/<yyyymmddThhmmss>-<slot>-<seq>.<extension>`
///
/// Keys are unique per process, not per content: submitting the same photo
/// twice stores it twice.
pub fn object_key(
    location_id: &str,
    slot: &PhotoSlot,
    captured_at: DateTime<Utc>,
    extension: &str,
) -> String {
    let sequence = OBJECT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "inspections/{}/{}-{}-{sequence:06}.{}",
        key_segment(location_id),
        captured_at.format("%Y%m%dT%H%M%S"),
        key_segment(&slot.key_fragment()),
        key_segment(extension),
    )
}

/// Content type and file extension sniffed from the image header. Original
/// bytes uploaded after a processing failure need not be JPEG.
pub fn sniff_content(bytes: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(bytes) {
        Ok(format) => (
            format.to_mime_type(),
            format.extensions_str().first().copied().unwrap_or("bin"),
        ),
        Err(_) => ("application/octet-stream", "bin"),
    }
}

fn key_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Filesystem-backed store serving objects under a public base URL.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone(), config.public_url.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, object: UploadObject) -> Result<String, StorageError> {
        let path = self.resolve(&object.key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, &object.bytes)
            .await
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(key = %object.key, bytes = object.bytes.len(), "object stored");
        Ok(format!("{}/{}", self.public_url, object.key))
    }
}
