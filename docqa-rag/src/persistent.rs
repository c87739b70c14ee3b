//! File-backed vector store.
//!
//! Each collection lives in `<dir>/<collection>.json` together with the id
//! of the embedding model that produced its vectors. A collection written by
//! a different model is treated as absent, so switching models forces a
//! rebuild instead of mixing incompatible vectors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{OrderedChunks, VectorStore, rank};

const FORMAT_VERSION: u32 = 1;
const BACKEND: &str = "File";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedCollection {
    version: u32,
    embedding_model: String,
    chunks: OrderedChunks,
}

/// A vector store that keeps one JSON file per collection under a directory.
///
/// Loaded collections are cached; every mutation is written through to disk.
#[derive(Debug)]
pub struct FileVectorStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, PersistedCollection>>,
}

impl FileVectorStore {
    /// Open (and create if necessary) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| store_error(&dir, e))?;
        Ok(Self { dir, cache: RwLock::new(HashMap::new()) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, collection: &str) -> Result<PathBuf> {
        let valid = !collection.is_empty()
            && collection.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !collection.starts_with('.');
        if !valid {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("invalid collection name '{collection}'"),
            });
        }
        Ok(self.dir.join(format!("{collection}.json")))
    }

    async fn read_from_disk(&self, collection: &str) -> Result<Option<PersistedCollection>> {
        let path = self.path_for(collection)?;
        if !tokio::fs::try_exists(&path).await.map_err(|e| store_error(&path, e))? {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(&path).await.map_err(|e| store_error(&path, e))?;
        match serde_json::from_str::<PersistedCollection>(&data) {
            Ok(persisted) if persisted.version == FORMAT_VERSION => Ok(Some(persisted)),
            Ok(persisted) => {
                warn!(
                    path = %path.display(),
                    version = persisted.version,
                    "ignoring collection with unsupported format version"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable collection file");
                Ok(None)
            }
        }
    }

    async fn write_to_disk(&self, collection: &str, persisted: &PersistedCollection) -> Result<()> {
        let path = self.path_for(collection)?;
        let data = serde_json::to_string_pretty(persisted).map_err(|e| RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("failed to serialize collection '{collection}': {e}"),
        })?;
        tokio::fs::write(&path, data).await.map_err(|e| store_error(&path, e))?;
        debug!(path = %path.display(), chunks = persisted.chunks.len(), "collection written");
        Ok(())
    }

    /// Make sure `collection` is in the cache if it exists on disk.
    async fn load(&self, collection: &str) -> Result<bool> {
        if self.cache.read().await.contains_key(collection) {
            return Ok(true);
        }
        match self.read_from_disk(collection).await? {
            Some(persisted) => {
                self.cache.write().await.insert(collection.to_string(), persisted);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn store_error(path: &Path, error: std::io::Error) -> RagError {
    RagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("{}: {error}", path.display()),
    }
}

fn missing(collection: &str) -> RagError {
    RagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("collection '{collection}' does not exist"),
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn create_collection(&self, name: &str, embedding_model: &str) -> Result<()> {
        if self.load(name).await? {
            let mut cache = self.cache.write().await;
            if let Some(existing) = cache.get_mut(name) {
                if existing.embedding_model == embedding_model {
                    return Ok(());
                }
                // Vectors from another model cannot be searched with this one.
                existing.embedding_model = embedding_model.to_string();
                existing.chunks.clear();
                let snapshot = existing.clone();
                drop(cache);
                return self.write_to_disk(name, &snapshot).await;
            }
        }
        let persisted = PersistedCollection {
            version: FORMAT_VERSION,
            embedding_model: embedding_model.to_string(),
            chunks: OrderedChunks::default(),
        };
        self.write_to_disk(name, &persisted).await?;
        self.cache.write().await.insert(name.to_string(), persisted);
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        self.cache.write().await.remove(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error(&path, e)),
        }
    }

    async fn collection_exists(&self, name: &str, embedding_model: &str) -> Result<bool> {
        if !self.load(name).await? {
            return Ok(false);
        }
        let cache = self.cache.read().await;
        Ok(cache
            .get(name)
            .is_some_and(|c| c.embedding_model == embedding_model && !c.chunks.is_empty()))
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if !self.load(collection).await? {
            return Err(missing(collection));
        }
        let snapshot = {
            let mut cache = self.cache.write().await;
            let store = cache.get_mut(collection).ok_or_else(|| missing(collection))?;
            for chunk in chunks {
                store.chunks.upsert(chunk.clone());
            }
            store.clone()
        };
        self.write_to_disk(collection, &snapshot).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if !self.load(collection).await? {
            return Err(missing(collection));
        }
        let cache = self.cache.read().await;
        let store = cache.get(collection).ok_or_else(|| missing(collection))?;
        Ok(rank(store.chunks.iter(), embedding, top_k))
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("text of {id}"),
            embedding,
            metadata: HashMap::new(),
            document_id: "doc".to_string(),
        }
    }

    #[tokio::test]
    async fn collections_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileVectorStore::open(dir.path()).await.unwrap();
            store.create_collection("manual", "embed-a").await.unwrap();
            store
                .upsert("manual", &[chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])])
                .await
                .unwrap();
        }

        let reopened = FileVectorStore::open(dir.path()).await.unwrap();
        assert!(reopened.collection_exists("manual", "embed-a").await.unwrap());
        let results = reopened.search("manual", &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].chunk.id, "b");
    }

    #[tokio::test]
    async fn collection_from_other_model_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("manual", "embed-a").await.unwrap();
        store.upsert("manual", &[chunk("a", vec![1.0])]).await.unwrap();

        assert!(!store.collection_exists("manual", "embed-b").await.unwrap());

        store.create_collection("manual", "embed-b").await.unwrap();
        assert!(!store.collection_exists("manual", "embed-b").await.unwrap());
        assert!(store.search("manual", &[1.0], 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("tmp", "m").await.unwrap();
        assert!(dir.path().join("tmp.json").exists());

        store.delete_collection("tmp").await.unwrap();
        assert!(!dir.path().join("tmp.json").exists());
        store.delete_collection("tmp").await.unwrap();
    }

    #[tokio::test]
    async fn reupserting_a_chunk_replaces_it_across_reopening() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileVectorStore::open(dir.path()).await.unwrap();
            store.create_collection("manual", "embed-a").await.unwrap();
            store
                .upsert("manual", &[chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])])
                .await
                .unwrap();
        }

        let reopened = FileVectorStore::open(dir.path()).await.unwrap();
        reopened.upsert("manual", &[chunk("a", vec![0.0, 1.0])]).await.unwrap();

        let results = reopened.search("manual", &[0.0, 1.0], 4).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        // Equal scores keep insertion order; "a" kept its original slot.
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = FileVectorStore::open(dir.path()).await.unwrap();
        assert!(!store.collection_exists("broken", "m").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_path_like_collection_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVectorStore::open(dir.path()).await.unwrap();
        for name in ["", "../escape", "a/b", ".hidden"] {
            assert!(store.create_collection(name, "m").await.is_err(), "{name:?}");
        }
    }
}
