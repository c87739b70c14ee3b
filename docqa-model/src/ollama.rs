//! Ollama completion client using `/api/generate`.
//!
//! This module is only available when the `ollama` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ModelError, Result};
use crate::model::CompletionModel;

/// The default local Ollama endpoint.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// A [`CompletionModel`] backed by a local Ollama server.
///
/// Uses non-streaming `/api/generate` calls; the full completion is returned
/// verbatim.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_model::OllamaModel;
///
/// let model = OllamaModel::new("http://localhost:11434", "llama3.2")?;
/// let text = model.complete("Summarize: ...").await?;
/// ```
pub struct OllamaModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaModel {
    /// Create a client for `model` on the Ollama server at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ModelError::InvalidConfig("model name must not be empty".into()));
        }
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client: reqwest::Client::new(), base_url, model })
    }

    /// Set an overall request timeout on the underlying HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    /// Return the server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> ModelError {
        if e.is_connect() || e.is_timeout() {
            ModelError::Unreachable { endpoint: self.base_url.clone(), message: e.to_string() }
        } else {
            ModelError::Completion(e.to_string())
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response =
            self.client.get(&url).send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api { status: status.as_u16(), body });
        }

        let tags: TagsResponse =
            response.json().await.map_err(|e| ModelError::ResponseParsing(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
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

/// Ollama reports installed models with an explicit tag (`llama3.2:latest`).
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':') && installed.strip_suffix(":latest") == Some(wanted))
}

// ── CompletionModel implementation ─────────────────────────────────

#[async_trait]
impl CompletionModel for OllamaModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest { model: &self.model, prompt, stream: false };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            error!(model = %self.model, error = %e, "completion request failed");
            self.map_send_error(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(model = %self.model, %status, "completion API error");
            return Err(ModelError::Api { status: status.as_u16(), body });
        }

        let parsed: GenerateResponse =
            response.json().await.map_err(|e| ModelError::ResponseParsing(e.to_string()))?;
        Ok(parsed.response)
    }

    async fn health_check(&self) -> Result<()> {
        let installed = self.list_models().await?;
        if installed.iter().any(|name| model_matches(name, &self.model)) {
            debug!(model = %self.model, "model available");
            Ok(())
        } else {
            Err(ModelError::ModelNotFound { model: self.model.clone() })
        }
    }
}
