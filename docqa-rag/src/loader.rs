//! Document ingestion.
//!
//! [`FileLoader`] turns a file on disk into a [`RawDocument`]: one segment
//! per PDF page (feature `pdf`), or the whole file for plain text and
//! Markdown. Loading is all-or-nothing; any failure yields
//! [`RagError::Ingestion`] and no partial segments.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{error, info};

use crate::document::{Document, RawDocument};
use crate::error::{RagError, Result};

/// Turns a source path into extracted text segments.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load every segment of the document at `path`.
    async fn load(&self, path: &Path) -> Result<RawDocument>;
}

/// Loads PDF, plain-text and Markdown files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Pdf,
    Text,
}

fn detect_format(path: &Path) -> Option<Format> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some(Format::Pdf),
        "txt" | "md" | "markdown" => Some(Format::Text),
        _ => None,
    }
}

fn ingestion_error(path: &Path, message: impl std::fmt::Display) -> RagError {
    error!(path = %path.display(), error = %message, "failed to load document");
    RagError::Ingestion(format!("{}: {message}", path.display()))
}

fn document_stem(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("document").to_string()
}

fn segment(path: &Path, id: String, text: String, page: Option<usize>) -> Document {
    let mut metadata = HashMap::from([("source".to_string(), path.display().to_string())]);
    if let Some(page) = page {
        metadata.insert("page".to_string(), page.to_string());
    }
    Document { id, text, metadata, source_uri: Some(path.display().to_string()) }
}

#[cfg(feature = "pdf")]
async fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| ingestion_error(path, e))?;
    let pages = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| ingestion_error(path, format!("extraction task failed: {e}")))?
    .map_err(|e| ingestion_error(path, format!("PDF extraction failed: {e}")))?;

    let stem = document_stem(path);
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| segment(path, format!("{stem}_p{}", i + 1), text, Some(i + 1)))
        .collect())
}

#[cfg(not(feature = "pdf"))]
async fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    Err(ingestion_error(path, "PDF support is not enabled (build with the `pdf` feature)"))
}

async fn load_text(path: &Path) -> Result<Vec<Document>> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| ingestion_error(path, e))?;
    Ok(vec![segment(path, document_stem(path), text, None)])
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, path: &Path) -> Result<RawDocument> {
        let is_file = tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            return Err(ingestion_error(path, "file not found"));
        }
        let format =
            detect_format(path).ok_or_else(|| ingestion_error(path, "unsupported document format"))?;

        let segments = match format {
            Format::Pdf => load_pdf(path).await?,
            Format::Text => load_text(path).await?,
        };
        if segments.is_empty() {
            return Err(ingestion_error(path, "document contains no pages"));
        }

        info!(path = %path.display(), segment_count = segments.len(), "document loaded");
        Ok(RawDocument::new(path, segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_text_file_as_single_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\n\nSome content.").unwrap();

        let raw = FileLoader::new().load(&path).await.unwrap();
        assert_eq!(raw.segments.len(), 1);
        assert_eq!(raw.segments[0].id, "notes");
        assert_eq!(raw.segments[0].metadata["source"], path.display().to_string());
        assert!(raw.segments[0].text.contains("Some content."));
        assert_eq!(raw.source(), path.as_path());
    }

    #[tokio::test]
    async fn missing_file_is_an_ingestion_failure() {
        let err = FileLoader::new().load(Path::new("/nonexistent/manual.pdf")).await.unwrap_err();
        assert!(matches!(err, RagError::Ingestion(ref m) if m.contains("/nonexistent/manual.pdf")));
    }

    #[tokio::test]
    async fn unsupported_extension_is_an_ingestion_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.xlsx");
        std::fs::write(&path, b"PK").unwrap();
        let err = FileLoader::new().load(&path).await.unwrap_err();
        assert!(matches!(err, RagError::Ingestion(ref m) if m.contains("unsupported")));
    }

    #[tokio::test]
    async fn directory_is_not_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileLoader::new().load(dir.path()).await.unwrap_err();
        assert!(matches!(err, RagError::Ingestion(_)));
    }

    #[test]
    fn format_detection_ignores_case() {
        assert_eq!(detect_format(Path::new("A.PDF")), Some(Format::Pdf));
        assert_eq!(detect_format(Path::new("readme.txt")), Some(Format::Text));
        assert_eq!(detect_format(Path::new("noext")), None);
    }
}
