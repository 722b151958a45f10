// src/objects.rs

use crate::error::StorageError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Read side of the attachment store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Buckets are directories under `root`; keys are relative paths inside them.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let escapes = |p: &str| {
            Path::new(p)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        };
        if bucket.is_empty() || key.is_empty() || escapes(bucket) || escapes(key) {
            return Err(StorageError::AccessDenied(format!("{bucket}/{key}")));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        debug!(path = %path.display(), "reading object");
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(format!("{bucket}/{key}")),
            ErrorKind::PermissionDenied => StorageError::AccessDenied(format!("{bucket}/{key}")),
            _ => StorageError::Io(e),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_object_from_bucket_dir() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("attachments/msg-1");
        std::fs::create_dir_all(&obj).unwrap();
        std::fs::write(obj.join("a_invoice.pdf"), b"%PDF-1.7").unwrap();

        let store = FsObjectStore::new(dir.path());
        let bytes = store.get("attachments", "msg-1/a_invoice.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let err = store.get("attachments", "nope.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_path_escape_denied() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        for key in ["../secret", "/etc/passwd", "a/../../b"] {
            let err = store.get("attachments", key).await.unwrap_err();
            assert!(matches!(err, StorageError::AccessDenied(_)), "{key}");
        }
    }
}
