//! Grounded answering.

use std::sync::Arc;

use docqa_model::CompletionModel;
use tracing::{debug, warn};

use crate::error::Result;
use crate::prompt::PromptTemplate;
use crate::record::QuestionAnswerPair;
use crate::retrieval::CandidateSet;

/// Answers a question from retrieved context with a single completion call.
///
/// The completion text is returned verbatim as the answer.
pub struct GroundedAnswerer {
    model: Arc<dyn CompletionModel>,
    prompt: PromptTemplate,
}

impl GroundedAnswerer {
    pub fn new(model: Arc<dyn CompletionModel>, prompt: PromptTemplate) -> Self {
        Self { model, prompt }
    }

    pub async fn answer(
        &self,
        candidates: &CandidateSet,
        question: &str,
    ) -> Result<QuestionAnswerPair> {
        if candidates.is_empty() {
            warn!(question, "answering without retrieved context");
        }
        let context = candidates.context();
        let prompt = self.prompt.render(&[("context", &context), ("question", question)]);
        debug!(question, context_chunks = candidates.len(), prompt_len = prompt.len(), "answering");

        let answer = self.model.complete(&prompt).await?;
        Ok(QuestionAnswerPair::new(question, answer))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use docqa_model::MockModel;

    use super::*;
    use crate::document::Chunk;
    use crate::error::RagError;

    #[tokio::test]
    async fn prompt_contains_context_and_answer_is_verbatim() {
        let model = Arc::new(MockModel::new("m").with_response("  It is blue.\n"));
        let answerer = GroundedAnswerer::new(model.clone(), PromptTemplate::default_answer());

        let mut candidates = CandidateSet::new();
        candidates.insert(Chunk {
            id: "c0".into(),
            text: "The sky is blue.".into(),
            embedding: Vec::new(),
            metadata: HashMap::new(),
            document_id: "d".into(),
        });

        let pair = answerer.answer(&candidates, "What colour is the sky?").await.unwrap();
        assert_eq!(pair.question, "What colour is the sky?");
        assert_eq!(pair.answer, "  It is blue.\n");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("ONLY on the following context: The sky is blue."));
        assert!(prompts[0].ends_with("Question: What colour is the sky?"));
    }

    #[tokio::test]
    async fn model_error_propagates() {
        let model = Arc::new(MockModel::new("m").failing("backend down"));
        let answerer = GroundedAnswerer::new(model, PromptTemplate::default_answer());
        let err = answerer.answer(&CandidateSet::new(), "q").await.unwrap_err();
        assert!(matches!(err, RagError::Model(_)));
    }
}
