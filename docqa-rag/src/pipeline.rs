//! Question-answering pipeline orchestrator.
//!
//! [`QaPipeline`] runs ingest → chunk → index → retrieve → answer in order,
//! timing each stage through a [`RunContext`], and folds the answers into
//! a [`ResultRecord`]. The first failing stage ends the run. Within the
//! retrieve and answer stages each question is handled on its own: a
//! failing question does not stop the others, and the run fails once the
//! whole batch has been tried.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{QaPipeline, RagConfig, RunContext, RunRequest};
//!
//! let pipeline = QaPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .completion_model(Arc::new(model))
//!     .collection("manual")
//!     .build()?;
//!
//! let mut ctx = RunContext::new();
//! let record = pipeline.run(&mut ctx, request).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use docqa_model::CompletionModel;
use tracing::{error, info};
use uuid::Uuid;

use crate::answer::GroundedAnswerer;
use crate::chunking::{Chunker, RecursiveChunker, split_documents};
use crate::config::RagConfig;
use crate::context::{PipelineState, RunContext, Stage};
use crate::embedding::EmbeddingProvider;
use crate::error::{FailureKind, RagError, Result};
use crate::index::Indexer;
use crate::inmemory::InMemoryVectorStore;
use crate::loader::{DocumentLoader, FileLoader};
use crate::prompt::PromptTemplate;
use crate::record::{ModelInfo, ResultRecord, SystemInfo, aggregate};
use crate::retrieval::MultiQueryRetriever;
use crate::vectorstore::VectorStore;

/// Inputs of a single run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Document to answer questions about.
    pub source: PathBuf,
    /// Questions, answered in this order.
    pub questions: Vec<String>,
    /// Name the record is stored under.
    pub server_name: String,
    /// Host facts copied into the record.
    pub system_info: SystemInfo,
}

impl RunRequest {
    pub fn new(source: impl Into<PathBuf>, questions: Vec<String>) -> Self {
        Self {
            source: source.into(),
            questions,
            server_name: "localhost".to_string(),
            system_info: SystemInfo::unknown(),
        }
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }

    pub fn with_system_info(mut self, system_info: SystemInfo) -> Self {
        self.system_info = system_info;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            return Err(RagError::ConfigError("document path must not be empty".to_string()));
        }
        if self.questions.is_empty() {
            return Err(RagError::ConfigError("at least one question is required".to_string()));
        }
        if let Some(i) = self.questions.iter().position(|q| q.trim().is_empty()) {
            return Err(RagError::ConfigError(format!("question {} is empty", i + 1)));
        }
        if self.server_name.trim().is_empty() {
            return Err(RagError::ConfigError("server name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// The question-answering orchestrator.
///
/// Construct one via [`QaPipeline::builder()`].
pub struct QaPipeline {
    config: RagConfig,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    completion_model: Arc<dyn CompletionModel>,
    indexer: Indexer,
    retriever: MultiQueryRetriever,
    answerer: GroundedAnswerer,
    collection: String,
}

impl QaPipeline {
    /// Create a new [`QaPipelineBuilder`].
    pub fn builder() -> QaPipelineBuilder {
        QaPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Models reported in the result record.
    pub fn model_info(&self) -> ModelInfo {
        ModelInfo::new(self.completion_model.name(), self.embedding_provider.model())
    }

    /// Verify the completion model is reachable before any stage runs.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DependencyUnavailable`] naming the model.
    pub async fn check_dependencies(&self) -> Result<()> {
        let model = self.completion_model.name();
        self.completion_model.health_check().await.map_err(|e| {
            error!(model, error = %e, "completion model unavailable");
            RagError::DependencyUnavailable {
                dependency: format!("completion model '{model}'"),
                message: e.to_string(),
            }
        })
    }

    /// Run every stage for `request`.
    ///
    /// Each stage is timed into `ctx`, including a stage that fails. On
    /// failure `ctx` ends in [`PipelineState::Failed`] and later stages are
    /// never started. The returned record lists answers in question order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for invalid inputs (when
    /// `validate_inputs` is on) or the failing stage's error.
    pub async fn run(&self, ctx: &mut RunContext, request: RunRequest) -> Result<ResultRecord> {
        if self.config.validate_inputs {
            if let Err(err) = request.validate() {
                error!(
                    run_id = %ctx.run_id(),
                    kind = FailureKind::Configuration.as_str(),
                    error = %err,
                    "run rejected"
                );
                ctx.fail(None, FailureKind::Configuration);
                return Err(err);
            }
        }

        info!(
            run_id = %ctx.run_id(),
            source = %request.source.display(),
            questions = request.questions.len(),
            collection = %self.collection,
            "run started"
        );
        let timeout = self.config.stage_timeout;

        let raw = ctx.measure(Stage::Ingest, timeout, self.loader.load(&request.source)).await?;

        let chunks = ctx
            .measure(Stage::Chunk, timeout, async {
                split_documents(self.chunker.as_ref(), &raw.segments)
            })
            .await?;

        let index = ctx
            .measure(Stage::Index, timeout, self.indexer.build(chunks, &self.collection))
            .await?;

        let run_id = ctx.run_id();
        let resolved = ctx
            .measure(Stage::Retrieve, timeout, async {
                let mut resolved = Vec::with_capacity(request.questions.len());
                for question in &request.questions {
                    let outcome = self.retriever.resolve(&index, question).await;
                    if let Err(e) = &outcome {
                        log_question_failure(run_id, Stage::Retrieve, question, e);
                    }
                    resolved.push(outcome);
                }
                Ok(resolved)
            })
            .await?;

        // Questions that failed retrieval are carried through unanswered.
        let outcomes = ctx
            .measure(Stage::Answer, timeout, async {
                let mut outcomes = Vec::with_capacity(resolved.len());
                for (question, retrieved) in request.questions.iter().zip(resolved) {
                    let outcome = match retrieved {
                        Ok(candidates) => {
                            self.answerer.answer(&candidates, question).await.map_err(|e| {
                                log_question_failure(run_id, Stage::Answer, question, &e);
                                (Stage::Answer, e)
                            })
                        }
                        Err(e) => Err((Stage::Retrieve, e)),
                    };
                    outcomes.push(outcome);
                }
                Ok(outcomes)
            })
            .await?;

        let mut answers = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (question, outcome) in request.questions.iter().zip(outcomes) {
            match outcome {
                Ok(pair) => answers.push(pair),
                Err((stage, e)) => failures.push((stage, question, e)),
            }
        }

        if let Some(stage) = failures.iter().map(|(stage, ..)| *stage).min() {
            let detail: Vec<String> = failures
                .iter()
                .map(|(_, question, e)| format!("question {question:?}: {e}"))
                .collect();
            let err = stage.failure(format!(
                "{} of {} questions failed: {}",
                failures.len(),
                request.questions.len(),
                detail.join("; ")
            ));
            ctx.fail(Some(stage), stage.failure_kind());
            ctx.keep_partial_answers(answers);
            return Err(err);
        }

        ctx.transition(PipelineState::Aggregating)?;
        let record = aggregate(
            request.server_name,
            request.system_info,
            ctx.timings().clone(),
            self.model_info(),
            answers,
        );
        ctx.transition(PipelineState::Done)?;

        info!(
            run_id = %ctx.run_id(),
            answers = record.questions_and_answers().len(),
            total_secs = ctx.timings().total(),
            "run complete"
        );
        Ok(record)
    }
}

fn log_question_failure(run_id: Uuid, stage: Stage, question: &str, err: &RagError) {
    error!(
        run_id = %run_id,
        stage = stage.key(),
        kind = stage.failure_kind().as_str(),
        question,
        error = %err,
        "stage failed"
    );
}

/// Builder for constructing a [`QaPipeline`].
///
/// The embedding provider, completion model and collection are required.
/// Everything else has a default: [`RagConfig::default`], [`FileLoader`],
/// a [`RecursiveChunker`] sized from the config, an
/// [`InMemoryVectorStore`], and the default prompts.
#[derive(Default)]
pub struct QaPipelineBuilder {
    config: Option<RagConfig>,
    loader: Option<Arc<dyn DocumentLoader>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    completion_model: Option<Arc<dyn CompletionModel>>,
    query_prompt: Option<PromptTemplate>,
    answer_prompt: Option<PromptTemplate>,
    collection: Option<String>,
}

impl QaPipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn completion_model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.completion_model = Some(model);
        self
    }

    /// Template used to ask for alternative phrasings.
    pub fn query_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.query_prompt = Some(prompt);
        self
    }

    /// Template used to ask for the grounded answer.
    pub fn answer_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.answer_prompt = Some(prompt);
        self
    }

    /// Vector store collection holding this document's chunks.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Build the [`QaPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required part is missing, the
    /// collection name is blank, or the chunk parameters are invalid.
    pub fn build(self) -> Result<QaPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let completion_model = self
            .completion_model
            .ok_or_else(|| RagError::ConfigError("completion_model is required".to_string()))?;
        let collection = self
            .collection
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| RagError::ConfigError("collection is required".to_string()))?;

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };
        let loader = self.loader.unwrap_or_else(|| Arc::new(FileLoader::new()));
        let vector_store =
            self.vector_store.unwrap_or_else(|| Arc::new(InMemoryVectorStore::new()));

        let indexer = Indexer::new(Arc::clone(&embedding_provider), vector_store)
            .with_persistence(config.persist_index);
        let retriever = MultiQueryRetriever::new(
            Arc::clone(&completion_model),
            self.query_prompt.unwrap_or_else(PromptTemplate::default_query),
            config.top_k,
        );
        let answerer = GroundedAnswerer::new(
            Arc::clone(&completion_model),
            self.answer_prompt.unwrap_or_else(PromptTemplate::default_answer),
        );

        Ok(QaPipeline {
            config,
            loader,
            chunker,
            embedding_provider,
            completion_model,
            indexer,
            retriever,
            answerer,
            collection,
        })
    }
}
