use async_trait::async_trait;

use crate::error::Result;

/// A language model that turns a prompt into text.
///
/// Implementations wrap a specific backend (Ollama, a mock, ...) behind a
/// single blocking-style async call. Streaming is not part of the contract:
/// the pipeline always waits for the full completion.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Identifier of the underlying model, recorded in the result record.
    fn name(&self) -> &str;

    /// Complete `prompt` and return the raw generated text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Verify the backend is reachable and the model is installed.
    ///
    /// Called once at startup, before any pipeline stage runs. The default
    /// implementation assumes the model is always available.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
