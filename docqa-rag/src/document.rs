//! Data types for raw documents, chunks, and search results.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A segment of extracted source text (one PDF page, one text file, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the segment.
    pub id: String,
    /// The text content of the segment.
    pub text: String,
    /// Key-value metadata (`source`, `page`, ...).
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

/// Everything extracted from one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// The file the segments were extracted from.
    pub source: PathBuf,
    /// Extracted segments in document order.
    pub segments: Vec<Document>,
}

impl RawDocument {
    pub fn new(source: impl Into<PathBuf>, segments: Vec<Document>) -> Self {
        Self { source: source.into(), segments }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// A bounded span of a [`Document`] with its vector embedding.
///
/// The embedding is empty until the chunk passes through the indexer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Metadata inherited from the parent document plus `chunk_index`.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
