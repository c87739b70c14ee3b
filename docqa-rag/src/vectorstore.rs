//! Vector store trait for storing and searching vector embeddings.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s and support
/// upserting and searching by vector similarity.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", "nomic-embed-text").await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection for vectors produced by `embedding_model`.
    /// No-op if it already exists.
    async fn create_collection(&self, name: &str, embedding_model: &str) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Whether a collection built with `embedding_model` already holds data.
    async fn collection_exists(&self, name: &str, embedding_model: &str) -> Result<bool>;

    /// Upsert chunks into a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Whether collections survive the process.
    fn is_persistent(&self) -> bool {
        false
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Score `chunks` against `embedding` and keep the best `top_k`.
///
/// Ties keep insertion order so results are reproducible.
pub(crate) fn rank<'a>(
    chunks: impl Iterator<Item = &'a Chunk>,
    embedding: &[f32],
    top_k: usize,
) -> Vec<SearchResult> {
    let mut scored: Vec<SearchResult> = chunks
        .map(|chunk| SearchResult {
            score: cosine_similarity(&chunk.embedding, embedding),
            chunk: chunk.clone(),
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

/// Chunks of one collection in insertion order, indexed by id.
///
/// Upserting an existing id replaces the chunk in place. Serializes as a
/// plain list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Chunk>", into = "Vec<Chunk>")]
pub(crate) struct OrderedChunks {
    chunks: Vec<Chunk>,
    positions: HashMap<String, usize>,
}

impl OrderedChunks {
    pub(crate) fn upsert(&mut self, chunk: Chunk) {
        match self.positions.get(&chunk.id) {
            Some(&at) => self.chunks[at] = chunk,
            None => {
                self.positions.insert(chunk.id.clone(), self.chunks.len());
                self.chunks.push(chunk);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.chunks.clear();
        self.positions.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }
}

impl From<Vec<Chunk>> for OrderedChunks {
    fn from(chunks: Vec<Chunk>) -> Self {
        let mut ordered = Self::default();
        for chunk in chunks {
            ordered.upsert(chunk);
        }
        ordered
    }
}

impl From<OrderedChunks> for Vec<Chunk> {
    fn from(ordered: OrderedChunks) -> Self {
        ordered.chunks
    }
}
