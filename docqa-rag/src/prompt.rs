//! Prompt templates for query expansion and grounded answering.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{RagError, Result};

/// Asks the model for alternative phrasings of the question, one per line.
pub const DEFAULT_QUERY_PROMPT: &str = "You are an AI language model assistant. Generate five \
alternative versions of the user question to retrieve relevant documents from a vector \
database. By rephrasing the question from different perspectives, help the user overcome \
the limitations of distance-based similarity search. Write one alternative per line, \
without numbering or commentary.\nOriginal question: {question}";

/// Restricts the answer to the retrieved context.
pub const DEFAULT_ANSWER_PROMPT: &str =
    "Answer the question based ONLY on the following context: {context}\nQuestion: {question}";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-z_]+)\}").expect("unreachable error: placeholder pattern is valid")
});

/// A text template with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Create a template, requiring every placeholder in `required`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] naming the first missing placeholder.
    pub fn new(template: impl Into<String>, required: &[&str]) -> Result<Self> {
        let template = template.into();
        if let Some(missing) = required.iter().find(|name| !template.contains(&format!("{{{name}}}")))
        {
            return Err(RagError::ConfigError(format!(
                "prompt template is missing the {{{missing}}} placeholder"
            )));
        }
        Ok(Self { template })
    }

    /// A query-expansion template; must contain `{question}`.
    pub fn query(template: impl Into<String>) -> Result<Self> {
        Self::new(template, &["question"])
    }

    /// An answer template; must contain `{context}` and `{question}`.
    pub fn answer(template: impl Into<String>) -> Result<Self> {
        Self::new(template, &["context", "question"])
    }

    pub fn default_query() -> Self {
        Self { template: DEFAULT_QUERY_PROMPT.to_string() }
    }

    pub fn default_answer() -> Self {
        Self { template: DEFAULT_ANSWER_PROMPT.to_string() }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute placeholders in a single pass.
    ///
    /// Values are inserted verbatim and never re-scanned, so a document
    /// that happens to contain `{question}` is left alone. Unknown
    /// placeholders stay as written.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures<'_>| {
                let name = &caps[1];
                vars.iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (*value).to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}
