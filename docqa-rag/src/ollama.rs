//! Ollama embedding provider using `/api/embed`.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "Ollama";

/// An [`EmbeddingProvider`] backed by a local Ollama server.
///
/// [`ensure_model`](EmbeddingProvider::ensure_model) pulls the model when the
/// server does not list it yet.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("http://localhost:11434", "nomic-embed-text")?;
/// provider.ensure_model().await?;
/// let vectors = provider.embed_batch(&["first", "second"]).await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `model` on the Ollama server at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(RagError::ConfigError("embedding model name must not be empty".into()));
        }
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client: reqwest::Client::new(), base_url, model })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn installed_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(request_failed)?;
        let response = check_status(response).await?;
        let tags: TagsResponse = response.json().await.map_err(parse_failed)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull(&self) -> Result<()> {
        info!(provider = PROVIDER, model = %self.model, "pulling embedding model");
        let url = format!("{}/api/pull", self.base_url);
        let body = PullRequest { model: &self.model, stream: false };
        let response = self.client.post(&url).json(&body).send().await.map_err(request_failed)?;
        let response = check_status(response).await?;
        let status: PullResponse = response.json().await.map_err(parse_failed)?;
        if status.status != "success" {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!("pull of '{}' ended with status '{}'", self.model, status.status),
            });
        }
        Ok(())
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct PullResponse {
    status: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

fn request_failed(e: reqwest::Error) -> RagError {
    error!(provider = PROVIDER, error = %e, "request failed");
    RagError::EmbeddingError { provider: PROVIDER.into(), message: format!("request failed: {e}") }
}

fn parse_failed(e: reqwest::Error) -> RagError {
    error!(provider = PROVIDER, error = %e, "failed to parse response");
    RagError::EmbeddingError {
        provider: PROVIDER.into(),
        message: format!("failed to parse response: {e}"),
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
    error!(provider = PROVIDER, %status, "API error");
    Err(RagError::EmbeddingError {
        provider: PROVIDER.into(),
        message: format!("API returned {status}: {detail}"),
    })
}

/// Ollama reports installed models with an explicit tag (`nomic-embed-text:latest`).
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':') && installed.strip_suffix(":latest") == Some(wanted))
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest { model: &self.model, input: texts.to_vec() };
        let response = self.client.post(&url).json(&body).send().await.map_err(request_failed)?;
        let response = check_status(response).await?;
        let parsed: EmbedResponse = response.json().await.map_err(parse_failed)?;

        if parsed.embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.embeddings.len()
                ),
            });
        }
        Ok(parsed.embeddings)
    }

    async fn ensure_model(&self) -> Result<()> {
        let installed = self.installed_models().await?;
        if installed.iter().any(|name| model_matches(name, &self.model)) {
            debug!(provider = PROVIDER, model = %self.model, "embedding model already installed");
            return Ok(());
        }
        self.pull().await
    }
}
