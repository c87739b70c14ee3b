//! Index construction and querying.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::document::Chunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Number of chunks sent to the embedding provider per request.
const EMBED_BATCH_SIZE: usize = 64;

/// A built, queryable collection of embedded chunks.
pub struct Index {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: String,
    chunk_count: usize,
    reused: bool,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("collection", &self.collection)
            .field("embedding_model", &self.embedder.model())
            .field("chunk_count", &self.chunk_count)
            .field("reused", &self.reused)
            .finish()
    }
}

impl Index {
    /// The `k` chunks most similar to `text`, best first.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<Chunk>> {
        let embedding = self.embedder.embed(text).await?;
        let results = self.store.search(&self.collection, &embedding, k).await?;
        debug!(collection = %self.collection, k, hits = results.len(), "index queried");
        Ok(results.into_iter().map(|r| r.chunk).collect())
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model()
    }

    /// Number of chunks this run handed to the indexer.
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Whether a stored collection was loaded instead of re-embedding.
    pub fn reused(&self) -> bool {
        self.reused
    }
}

/// Embeds chunks and stores them in a [`VectorStore`] collection.
///
/// With persistence enabled and a persistent backend, an existing
/// collection built by the same embedding model is reused as is.
pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    persist: bool,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store, persist: false }
    }

    pub fn with_persistence(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Build an index over `chunks` in `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Indexing`] for an empty chunk list or a malformed
    /// embedding response, and propagates embedding and store errors. A
    /// failed build removes the collection so no partial index remains.
    pub async fn build(&self, chunks: Vec<Chunk>, collection: &str) -> Result<Index> {
        if chunks.is_empty() {
            return Err(RagError::Indexing("no chunks to index".to_string()));
        }

        self.embedder.ensure_model().await?;
        let model = self.embedder.model();
        let chunk_count = chunks.len();

        if self.persist
            && self.store.is_persistent()
            && self.store.collection_exists(collection, model).await?
        {
            info!(collection, embedding_model = model, "reusing stored collection");
            return Ok(self.index(collection, chunk_count, true));
        }

        // Overwrite, never append to, a stale collection.
        self.store.delete_collection(collection).await?;
        self.store.create_collection(collection, model).await?;

        if let Err(err) = self.embed_and_store(chunks, collection).await {
            if let Err(cleanup) = self.store.delete_collection(collection).await {
                warn!(collection, error = %cleanup, "failed to remove partial collection");
            }
            return Err(err);
        }

        info!(collection, embedding_model = model, chunk_count, "index built");
        Ok(self.index(collection, chunk_count, false))
    }

    async fn embed_and_store(&self, mut chunks: Vec<Chunk>, collection: &str) -> Result<()> {
        for batch in chunks.chunks_mut(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(RagError::Indexing(format!(
                    "embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }
        self.store.upsert(collection, &chunks).await
    }

    fn index(&self, collection: &str, chunk_count: usize, reused: bool) -> Index {
        Index {
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
            collection: collection.to_string(),
            chunk_count,
            reused,
        }
    }
}
