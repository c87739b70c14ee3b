//! Deterministic embedding provider for tests and offline demos.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Hashes each lowercase word of the input into one of `dimensions`
/// buckets and L2-normalises the counts.
///
/// Texts sharing vocabulary end up close under cosine similarity, which is
/// enough to make retrieval results meaningful without a model server.
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    model: String,
    dimensions: usize,
    failure: Option<String>,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            model: "mock-embedding".to_string(),
            dimensions: dimensions.max(1),
            failure: None,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Report `model` as the embedding model id.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Make every embedding request fail with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of texts embedded so far, including failed attempts.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text passed to the provider, in call order.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
            embedding[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(text.to_string());
        if let Some(message) = &self.failure {
            return Err(RagError::EmbeddingError {
                provider: "Mock".to_string(),
                message: message.clone(),
            });
        }
        Ok(self.vectorize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn embeddings_are_deterministic_and_normalised() {
        let provider = MockEmbeddingProvider::new(64);
        let a = provider.embed("The quick brown fox").await.unwrap();
        let b = provider.embed("the QUICK brown fox").await.unwrap();
        assert_eq!(a, b);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn shared_vocabulary_scores_higher() {
        let provider = MockEmbeddingProvider::new(256);
        let query = provider.embed("rust ownership rules").await.unwrap();
        let related = provider.embed("ownership rules in rust explained").await.unwrap();
        let unrelated = provider.embed("baking sourdough bread").await.unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn failing_provider_reports_embedding_error() {
        let provider = MockEmbeddingProvider::new(8).failing("model crashed");
        let err = provider.embed("text").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { ref message, .. } if message == "model crashed"));
        assert_eq!(provider.texts(), vec!["text".to_string()]);
    }
}
