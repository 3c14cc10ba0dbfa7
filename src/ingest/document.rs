// src/ingest/document.rs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;
use tokio::process::Command;

use crate::storage::{DocumentStorage, document_key};

/// A failed pipeline stage. The pipeline stops at the first failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid file content: {0}")]
    Decode(String),
    #[error("Failed to convert document to PDF: {0}")]
    Convert(String),
    #[error("Failed to extract page count from PDF: {0}")]
    PageCount(String),
    #[error("Failed to upload document to storage: {0}")]
    Upload(String),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "decode",
            PipelineError::Convert(_) => "convert",
            PipelineError::PageCount(_) => "count",
            PipelineError::Upload(_) => "upload",
        }
    }
}

/// Converts an office document into PDF bytes.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn to_pdf(&self, input: Vec<u8>) -> Result<Vec<u8>, PipelineError>;
}

/// Shells out to a headless LibreOffice.
pub struct LibreOfficeConverter {
    binary: String,
}

impl LibreOfficeConverter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl DocumentConverter for LibreOfficeConverter {
    async fn to_pdf(&self, input: Vec<u8>) -> Result<Vec<u8>, PipelineError> {
        let work_dir: PathBuf =
            std::env::temp_dir().join(format!("quizhub-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| PipelineError::Convert(e.to_string()))?;

        let result = convert_in(&self.binary, &work_dir, input).await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            tracing::warn!("Failed to clean up {}: {}", work_dir.display(), e);
        }
        result
    }
}

async fn convert_in(
    binary: &str,
    work_dir: &Path,
    input: Vec<u8>,
) -> Result<Vec<u8>, PipelineError> {
    let source = work_dir.join("input.docx");
    tokio::fs::write(&source, input)
        .await
        .map_err(|e| PipelineError::Convert(e.to_string()))?;

    let output = Command::new(binary)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(work_dir)
        .arg(&source)
        .output()
        .await
        .map_err(|e| PipelineError::Convert(format!("cannot run {}: {}", binary, e)))?;

    if !output.status.success() {
        return Err(PipelineError::Convert(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    tokio::fs::read(work_dir.join("input.pdf"))
        .await
        .map_err(|e| PipelineError::Convert(e.to_string()))
}

/// Decodes the uploaded base64 payload. A `data:` URL prefix and
/// embedded whitespace are accepted.
pub fn decode_upload(file: &str) -> Result<Vec<u8>, PipelineError> {
    let payload = match file.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => file,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    if bytes.is_empty() {
        return Err(PipelineError::Decode("file is empty".to_string()));
    }
    Ok(bytes)
}

pub fn count_pages(pdf: &[u8]) -> Result<u32, PipelineError> {
    let document =
        lopdf::Document::load_mem(pdf).map_err(|e| PipelineError::PageCount(e.to_string()))?;
    let pages = document.get_pages().len() as u32;
    if pages == 0 {
        return Err(PipelineError::PageCount("document has no pages".to_string()));
    }
    Ok(pages)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub key: String,
    pub pages: u32,
}

/// Runs decode, convert, count and upload for a topic's document.
///
/// Recording the key against the topic is left to the caller and must only
/// happen once this returns `Ok`, so a failed upload never leaves a record
/// pointing at a missing object.
pub async fn ingest_document(
    converter: &dyn DocumentConverter,
    storage: &DocumentStorage,
    topic_id: i64,
    file: &str,
) -> Result<StoredDocument, PipelineError> {
    let source = decode_upload(file)?;
    tracing::debug!(topic_id, bytes = source.len(), "document decoded");

    let pdf = converter.to_pdf(source).await?;
    let pages = count_pages(&pdf)?;

    let key = document_key(topic_id);
    storage
        .put_pdf(&key, pdf)
        .await
        .map_err(|e| PipelineError::Upload(e.to_string()))?;

    tracing::info!(topic_id, pages, key = %key, "document ingested");
    Ok(StoredDocument { key, pages })
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn encoded(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_decode_accepts_data_url_and_whitespace() {
        let body = format!("data:application/msword;base64,{}", encoded(b"hello docx"));
        let with_breaks = body.replace("aGVs", "aG\nVs");
        assert_eq!(decode_upload(&with_breaks).unwrap(), b"hello docx");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_upload("not base64 !!!").unwrap_err();
        assert_eq!(err.stage(), "decode");
    }

    #[test]
    fn test_count_pages() {
        assert_eq!(count_pages(&sample_pdf(3)).unwrap(), 3);
        assert!(count_pages(b"plain text").is_err());
    }

    #[tokio::test]
    async fn test_ingest_uploads_under_topic_key() {
        let storage = DocumentStorage::in_memory();
        let converter = FixedConverter(sample_pdf(2));

        let stored = ingest_document(&converter, &storage, 9, &encoded(b"docx bytes"))
            .await
            .unwrap();

        assert_eq!(stored, StoredDocument { key: "9-document.pdf".to_string(), pages: 2 });
        assert_eq!(storage.fetch("9-document.pdf").await.unwrap(), sample_pdf(2));
    }

    #[tokio::test]
    async fn test_conversion_failure_stores_nothing() {
        let storage = DocumentStorage::in_memory();

        let err = ingest_document(&FailingConverter, &storage, 9, &encoded(b"docx"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "convert");
        assert!(storage.fetch("9-document.pdf").await.is_err());
    }

    #[tokio::test]
    async fn test_unreadable_pdf_fails_at_count() {
        let storage = DocumentStorage::in_memory();
        let converter = FixedConverter(b"not a pdf".to_vec());

        let err = ingest_document(&converter, &storage, 1, &encoded(b"docx"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "count");
    }
}
