//! Scripted completion model for tests and offline demos.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ModelError, Result};
use crate::model::CompletionModel;

enum Reply {
    Text(String),
    Fail(String),
}

/// A [`CompletionModel`] that answers from a script instead of a backend.
///
/// Rules are checked in insertion order; the first rule whose needle occurs
/// in the prompt decides the reply. Prompts that match no rule get the
/// default response. Every prompt is recorded and can be inspected with
/// [`MockModel::prompts`].
///
/// ```rust
/// use docqa_model::{CompletionModel, MockModel};
///
/// let model = MockModel::new("mock")
///     .with_rule("alternative versions", "first rewrite\nsecond rewrite")
///     .with_response("the answer");
/// assert_eq!(model.name(), "mock");
/// ```
pub struct MockModel {
    name: String,
    default_reply: Reply,
    rules: Vec<(String, Reply)>,
    prompts: Mutex<Vec<String>>,
    unavailable: bool,
}

impl MockModel {
    /// Create a mock that answers every prompt with `"mock response"`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_reply: Reply::Text("mock response".to_string()),
            rules: Vec::new(),
            prompts: Mutex::new(Vec::new()),
            unavailable: false,
        }
    }

    /// Set the reply used when no rule matches.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.default_reply = Reply::Text(response.into());
        self
    }

    /// Fail every prompt that matches no rule.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.default_reply = Reply::Fail(message.into());
        self
    }

    /// Reply with `response` whenever the prompt contains `needle`.
    pub fn with_rule(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Reply::Text(response.into())));
        self
    }

    /// Fail with `message` whenever the prompt contains `needle`.
    pub fn fail_when(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Reply::Fail(message.into())));
        self
    }

    /// Make [`CompletionModel::health_check`] report the model as missing.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// All prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Number of completions requested so far.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

#[async_trait]
impl CompletionModel for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.default_reply);

        match reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(message) => Err(ModelError::Completion(message.clone())),
        }
    }

    async fn health_check(&self) -> Result<()> {
        if self.unavailable {
            return Err(ModelError::ModelNotFound { model: self.name.clone() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let model = MockModel::new("mock")
            .with_rule("paraphrase", "one\ntwo")
            .with_rule("para", "never reached")
            .with_response("fallback");

        assert_eq!(model.complete("please paraphrase this").await.unwrap(), "one\ntwo");
        assert_eq!(model.complete("something else").await.unwrap(), "fallback");
        assert_eq!(model.call_count(), 2);
        assert_eq!(model.prompts()[1], "something else");
    }

    #[tokio::test]
    async fn failing_rules_surface_completion_errors() {
        let model = MockModel::new("mock").fail_when("boom", "backend exploded");

        let err = model.complete("boom goes the prompt").await.unwrap_err();
        assert!(matches!(err, ModelError::Completion(ref m) if m == "backend exploded"));
        assert!(model.complete("quiet prompt").await.is_ok());
    }

    #[tokio::test]
    async fn unavailable_mock_fails_health_check() {
        let model = MockModel::new("llama3.2").unavailable();
        let err = model.health_check().await.unwrap_err();
        assert!(matches!(err, ModelError::ModelNotFound { ref model } if model == "llama3.2"));
    }
}
