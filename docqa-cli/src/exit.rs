//! Process exit statuses, one per failure category.
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | unexpected error |
//! | 2 | configuration |
//! | 3 | ingestion |
//! | 4 | chunking |
//! | 5 | indexing |
//! | 6 | retrieval |
//! | 7 | answer |
//! | 8 | dependency unavailable at startup |

use std::process::ExitCode;

use docqa_rag::{FailureKind, RagError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Unexpected = 1,
    Configuration = 2,
    Ingestion = 3,
    Chunking = 4,
    Indexing = 5,
    Retrieval = 6,
    Answer = 7,
    DependencyUnavailable = 8,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<FailureKind> for ExitStatus {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Configuration => Self::Configuration,
            FailureKind::DependencyUnavailable => Self::DependencyUnavailable,
            FailureKind::Ingestion => Self::Ingestion,
            FailureKind::Chunking => Self::Chunking,
            FailureKind::Indexing => Self::Indexing,
            FailureKind::Retrieval => Self::Retrieval,
            FailureKind::Answer => Self::Answer,
            FailureKind::Unexpected => Self::Unexpected,
        }
    }
}

impl From<&RagError> for ExitStatus {
    fn from(err: &RagError) -> Self {
        err.kind().into()
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use docqa_rag::Stage;

    use super::*;

    const ALL_KINDS: [FailureKind; 8] = [
        FailureKind::Configuration,
        FailureKind::DependencyUnavailable,
        FailureKind::Ingestion,
        FailureKind::Chunking,
        FailureKind::Indexing,
        FailureKind::Retrieval,
        FailureKind::Answer,
        FailureKind::Unexpected,
    ];

    #[test]
    fn every_failure_kind_has_a_distinct_non_zero_code() {
        let codes: HashSet<u8> = ALL_KINDS.iter().map(|k| ExitStatus::from(*k).code()).collect();
        assert_eq!(codes.len(), ALL_KINDS.len());
        assert!(!codes.contains(&ExitStatus::Success.code()));
    }

    #[test]
    fn stage_failures_map_to_their_codes() {
        assert_eq!(ExitStatus::from(&Stage::Ingest.failure("missing file")).code(), 3);
        assert_eq!(ExitStatus::from(&Stage::Chunk.failure("no chunks")).code(), 4);
        assert_eq!(ExitStatus::from(&Stage::Index.failure("embed failed")).code(), 5);
        assert_eq!(ExitStatus::from(&Stage::Retrieve.failure("search failed")).code(), 6);
        assert_eq!(ExitStatus::from(&Stage::Answer.failure("model down")).code(), 7);
    }

    #[test]
    fn configuration_and_dependency_codes() {
        assert_eq!(ExitStatus::from(&RagError::ConfigError("bad".into())), ExitStatus::Configuration);
        let unavailable = RagError::DependencyUnavailable {
            dependency: "ollama".into(),
            message: "connection refused".into(),
        };
        assert_eq!(ExitStatus::from(&unavailable).code(), 8);
        assert_eq!(ExitStatus::from(&RagError::InvalidState("x".into())), ExitStatus::Unexpected);
    }
}
