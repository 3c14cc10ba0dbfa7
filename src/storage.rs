// src/storage.rs

use std::sync::Arc;

use object_store::{
    ObjectStore, PutPayload, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory,
    path::Path as ObjectPath,
};
use thiserror::Error;

use crate::config::StorageBackend;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object '{0}' not found")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(#[from] object_store::Error),
    #[error("storage setup failed: {0}")]
    Setup(String),
}

/// Object storage accessor for converted documents.
///
/// Cloning is cheap, all clones share the same backend.
#[derive(Clone)]
pub struct DocumentStorage {
    store: Arc<dyn ObjectStore>,
}

impl DocumentStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Builds the backend selected in the configuration.
    /// S3 credentials come from the standard `AWS_*` environment variables.
    pub fn from_backend(backend: &StorageBackend) -> Result<Self, StorageError> {
        let store: Arc<dyn ObjectStore> = match backend {
            StorageBackend::S3 { bucket, region } => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_region(region)
                    .build()?,
            ),
            StorageBackend::Local { dir } => {
                std::fs::create_dir_all(dir).map_err(|e| StorageError::Setup(e.to_string()))?;
                Arc::new(LocalFileSystem::new_with_prefix(dir)?)
            }
            StorageBackend::Memory => Arc::new(InMemory::new()),
        };
        Ok(Self::new(store))
    }

    pub async fn put_pdf(&self, key: &str, content: Vec<u8>) -> Result<(), StorageError> {
        let path = ObjectPath::from(key);
        self.store.put(&path, PutPayload::from(content)).await?;
        tracing::debug!(key, "document stored");
        Ok(())
    }

    pub async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = ObjectPath::from(key);
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::Backend(other),
        })?;
        let bytes = result.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Storage key of a topic's converted document.
pub fn document_key(topic_id: i64) -> String {
    format!("{}-document.pdf", topic_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_key_uses_topic_id() {
        assert_eq!(document_key(42), "42-document.pdf");
    }

    #[tokio::test]
    async fn test_put_then_fetch() {
        let storage = DocumentStorage::in_memory();
        storage.put_pdf("7-document.pdf", b"%PDF-1.5".to_vec()).await.unwrap();

        let bytes = storage.fetch("7-document.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.5");
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let storage = DocumentStorage::in_memory();
        let err = storage.fetch("missing.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
