//! # docqa-rag
//!
//! Retrieval-augmented question answering over a single document.
//!
//! ## Overview
//!
//! A run goes through five stages, each timed and each able to end the run:
//!
//! | Stage | Component | Output |
//! |-------|-----------|--------|
//! | `ingest` | [`DocumentLoader`] ([`FileLoader`]) | [`RawDocument`] |
//! | `chunk` | [`Chunker`] ([`RecursiveChunker`]) | [`Chunk`]s |
//! | `index` | [`Indexer`] over an [`EmbeddingProvider`] and a [`VectorStore`] | [`Index`] |
//! | `retrieve` | [`MultiQueryRetriever`] | one [`CandidateSet`] per question |
//! | `answer` | [`GroundedAnswerer`] | [`QuestionAnswerPair`]s |
//!
//! [`QaPipeline`] wires the stages together, records timings in a
//! [`RunContext`], and returns a [`ResultRecord`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_model::OllamaModel;
//! use docqa_rag::{QaPipeline, RagConfig, RunContext, RunRequest};
//! use docqa_rag::ollama::OllamaEmbeddingProvider;
//!
//! let host = "http://localhost:11434";
//! let pipeline = QaPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OllamaEmbeddingProvider::new(host, "nomic-embed-text")?))
//!     .completion_model(Arc::new(OllamaModel::new(host, "llama3.2")?))
//!     .collection("manual")
//!     .build()?;
//!
//! let mut ctx = RunContext::new();
//! let request = RunRequest::new("manual.pdf", vec!["What does the warranty cover?".into()]);
//! let record = pipeline.run(&mut ctx, request).await?;
//! ```
//!
//! ## Features
//!
//! - `ollama`: [`ollama::OllamaEmbeddingProvider`]
//! - `pdf`: PDF text extraction in [`FileLoader`]
//! - `full`: all of the above

pub mod answer;
pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod inmemory;
pub mod loader;
pub mod mock;
pub mod persistent;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod retrieval;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use answer::GroundedAnswerer;
pub use chunking::{Chunker, DEFAULT_SEPARATORS, RecursiveChunker, split_documents};
pub use config::{RagConfig, RagConfigBuilder};
pub use context::{PipelineState, RunContext, Stage, StageTimings};
pub use document::{Chunk, Document, RawDocument, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{FailureKind, RagError, Result};
pub use index::{Index, Indexer};
pub use inmemory::InMemoryVectorStore;
pub use loader::{DocumentLoader, FileLoader};
pub use mock::MockEmbeddingProvider;
pub use persistent::FileVectorStore;
pub use pipeline::{QaPipeline, QaPipelineBuilder, RunRequest};
pub use prompt::{DEFAULT_ANSWER_PROMPT, DEFAULT_QUERY_PROMPT, PromptTemplate};
pub use record::{
    DiskSpace, ModelInfo, QuestionAnswerPair, ResultRecord, SystemInfo, aggregate,
};
pub use retrieval::{CandidateSet, MultiQueryRetriever, QueryExpansionSet};
pub use vectorstore::VectorStore;
