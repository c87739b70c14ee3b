//! Multi-query retrieval.
//!
//! One question is expanded into several phrasings by the completion
//! model. Each phrasing queries the index, and the per-phrasing hits are
//! merged into a [`CandidateSet`] without duplicates.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use docqa_model::CompletionModel;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::document::Chunk;
use crate::error::Result;
use crate::index::Index;
use crate::prompt::PromptTemplate;

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]+|\(?\d{1,2}[.):]|[a-zA-Z][.)])\s+")
        .expect("unreachable error: list marker pattern is valid")
});

/// The original question plus the model's alternative phrasings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExpansionSet {
    original: String,
    paraphrases: Vec<String>,
}

impl QueryExpansionSet {
    /// Parse a model response with one phrasing per line.
    ///
    /// List markers and wrapping quotes are stripped. Blank lines, headings
    /// ending in `:`, repeats, and restatements of the original question
    /// are dropped.
    pub fn parse(original: impl Into<String>, response: &str) -> Self {
        let original = original.into();
        let mut seen: HashSet<String> = HashSet::from([normalize(&original)]);
        let paraphrases = response
            .lines()
            .map(|line| LIST_MARKER.replace(line, "").trim().trim_matches('"').trim().to_string())
            .filter(|line| !line.is_empty() && !line.ends_with(':'))
            .filter(|line| seen.insert(normalize(line)))
            .collect();
        Self { original, paraphrases }
    }

    /// A set holding only the original question.
    pub fn original_only(original: impl Into<String>) -> Self {
        Self { original: original.into(), paraphrases: Vec::new() }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn paraphrases(&self) -> &[String] {
        &self.paraphrases
    }

    /// Every phrasing to query, original first.
    pub fn queries(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.original.as_str()).chain(self.paraphrases.iter().map(String::as_str))
    }

    /// True when the model produced no usable alternative.
    pub fn is_degenerate(&self) -> bool {
        self.paraphrases.is_empty()
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Deduplicated union of chunks retrieved for one question.
///
/// A chunk counts as a duplicate when its id or its exact text was already
/// seen. First-seen order is kept.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    chunks: Vec<Chunk>,
    ids: HashSet<String>,
    texts: HashSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `chunk` unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, chunk: Chunk) -> bool {
        if self.ids.contains(&chunk.id) || self.texts.contains(&chunk.text) {
            return false;
        }
        self.ids.insert(chunk.id.clone());
        self.texts.insert(chunk.text.clone());
        self.chunks.push(chunk);
        true
    }

    /// Append every result list in order, skipping duplicates.
    pub fn merge<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Vec<Chunk>>,
    {
        let mut set = Self::new();
        for chunk in results.into_iter().flatten() {
            set.insert(chunk);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk texts joined by blank lines, in retrieval order.
    pub fn context(&self) -> String {
        self.chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n")
    }
}

/// Expands a question with the completion model and merges index hits for
/// every phrasing.
pub struct MultiQueryRetriever {
    model: Arc<dyn CompletionModel>,
    prompt: PromptTemplate,
    top_k: usize,
}

impl MultiQueryRetriever {
    pub fn new(model: Arc<dyn CompletionModel>, prompt: PromptTemplate, top_k: usize) -> Self {
        Self { model, prompt, top_k }
    }

    /// Ask the model for alternative phrasings of `question`.
    ///
    /// A response with no usable line is not an error; the set then holds
    /// the original question only.
    pub async fn expand(&self, question: &str) -> Result<QueryExpansionSet> {
        let prompt = self.prompt.render(&[("question", question)]);
        let response = self.model.complete(&prompt).await?;
        let expansion = QueryExpansionSet::parse(question, &response);
        if expansion.is_degenerate() {
            warn!(question, "query expansion produced no alternatives, using the original question only");
        } else {
            debug!(question, paraphrases = expansion.paraphrases().len(), "question expanded");
        }
        Ok(expansion)
    }

    /// Resolve `question` against `index` into a [`CandidateSet`].
    ///
    /// The original question's hits come first, followed by each
    /// paraphrase's hits in the order the model listed them. An empty set
    /// is a valid result.
    pub async fn resolve(&self, index: &Index, question: &str) -> Result<CandidateSet> {
        let expansion = self.expand(question).await?;

        let mut results = Vec::new();
        for query in expansion.queries() {
            results.push(index.query(query, self.top_k).await?);
        }
        let candidates = CandidateSet::merge(results);

        info!(
            question,
            queries = expansion.paraphrases().len() + 1,
            candidates = candidates.len(),
            "candidates retrieved"
        );
        Ok(candidates)
    }
}
