//! Error types for the docqa pipeline.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::context::Stage;

/// Errors that can occur while building or running the pipeline.
///
/// The stage-specific variants (`Ingestion` through `Answer`) are what the
/// orchestrator surfaces; collaborator errors raised inside a stage are
/// rewritten into the stage's variant by [`RagError::at_stage`].
#[derive(Debug, Error)]
pub enum RagError {
    /// An error from an embedding provider.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error from a vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The source document could not be read or parsed.
    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    /// The ingested text produced no usable chunks.
    #[error("Chunking failed: {0}")]
    Chunking(String),

    /// The similarity index could not be built.
    #[error("Indexing failed: {0}")]
    Indexing(String),

    /// Query expansion or index lookup failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// The completion model could not produce an answer.
    #[error("Answer failed: {0}")]
    Answer(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A collaborator is not available at startup.
    #[error("Dependency unavailable ({dependency}): {message}")]
    DependencyUnavailable {
        /// The collaborator that failed its health check.
        dependency: String,
        /// A description of the failure.
        message: String,
    },

    /// The orchestrator was driven through an illegal state transition.
    #[error("Invalid pipeline state: {0}")]
    InvalidState(String),

    /// An error propagated from a completion model.
    #[error(transparent)]
    Model(#[from] docqa_model::ModelError),
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Failure category of a run, used for logging and process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    DependencyUnavailable,
    Ingestion,
    Chunking,
    Indexing,
    Retrieval,
    Answer,
    Unexpected,
}

impl FailureKind {
    /// Stable snake_case name, used as a log field value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::DependencyUnavailable => "dependency_unavailable",
            Self::Ingestion => "ingestion",
            Self::Chunking => "chunking",
            Self::Indexing => "indexing",
            Self::Retrieval => "retrieval",
            Self::Answer => "answer",
            Self::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RagError {
    /// The failure category this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Ingestion(_) => FailureKind::Ingestion,
            Self::Chunking(_) => FailureKind::Chunking,
            Self::Indexing(_) => FailureKind::Indexing,
            Self::Retrieval(_) => FailureKind::Retrieval,
            Self::Answer(_) => FailureKind::Answer,
            Self::ConfigError(_) => FailureKind::Configuration,
            Self::DependencyUnavailable { .. } => FailureKind::DependencyUnavailable,
            Self::EmbeddingError { .. }
            | Self::VectorStoreError { .. }
            | Self::InvalidState(_)
            | Self::Model(_) => FailureKind::Unexpected,
        }
    }

    /// Rewrite this error as a failure of `stage`.
    ///
    /// Errors that already carry the stage's kind are returned unchanged;
    /// anything else is wrapped with the stage name and original message.
    pub fn at_stage(self, stage: Stage) -> Self {
        if self.kind() == stage.failure_kind() {
            return self;
        }
        stage.failure(format!("{stage} stage: {self}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_model::ModelError;

    #[test]
    fn collaborator_errors_take_the_stage_kind() {
        let err = RagError::EmbeddingError {
            provider: "Ollama".into(),
            message: "connection refused".into(),
        }
        .at_stage(Stage::Index);

        assert_eq!(err.kind(), FailureKind::Indexing);
        let text = err.to_string();
        assert!(text.contains("index stage"), "{text}");
        assert!(text.contains("connection refused"), "{text}");
    }

    #[test]
    fn stage_errors_pass_through_unchanged() {
        let err = RagError::Chunking("no chunks".into()).at_stage(Stage::Chunk);
        assert!(matches!(err, RagError::Chunking(ref m) if m == "no chunks"));
    }

    #[test]
    fn model_errors_become_answer_failures_in_answer_stage() {
        let err = RagError::from(ModelError::Completion("boom".into())).at_stage(Stage::Answer);
        assert_eq!(err.kind(), FailureKind::Answer);
    }

    #[test]
    fn failure_kind_names_are_snake_case() {
        assert_eq!(FailureKind::DependencyUnavailable.to_string(), "dependency_unavailable");
        assert_eq!(serde_json::to_string(&FailureKind::Indexing).unwrap(), "\"indexing\"");
    }
}
