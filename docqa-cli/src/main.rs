//! docqa
//!
//! Answers questions about one document with a local Ollama server, times
//! every stage, and stores the result record.
//!
//! # Usage
//!
//! ```text
//! docqa --env-file bench.env --question "What does the warranty cover?"
//! ```
//!
//! The exit status identifies the failing stage; see [`docqa_cli::exit`].

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use docqa_cli::{AppConfig, ExitStatus, FirebaseSink, ResultSink, StdoutSink, config, host};
use docqa_model::{CompletionModel, OllamaModel};
use docqa_rag::ollama::OllamaEmbeddingProvider;
use docqa_rag::{
    FileVectorStore, InMemoryVectorStore, QaPipeline, RagError, ResultRecord, RunContext,
    RunRequest, SystemInfo, VectorStore,
};
use docqa_telemetry::{LogFormat, init_telemetry};
use tracing::{error, info, warn};

/// Document question answering over a local Ollama server.
#[derive(Debug, Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Load environment variables from this file instead of `./.env`.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Question to ask; repeat for several. Overrides `QUESTIONS`.
    #[arg(long = "question", value_name = "TEXT")]
    questions: Vec<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Run the pipeline without writing the record to the sink.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let env_loaded = load_env(cli.env_file.as_deref());

    let format = if cli.log_json {
        Ok(LogFormat::Json)
    } else {
        config::log_format(|key| std::env::var(key).ok())
    };
    if let Err(e) = init_telemetry(format.as_ref().copied().unwrap_or_default()) {
        eprintln!("failed to initialize logging: {e}");
    }

    if let Err(e) = env_loaded {
        error!(kind = "configuration", error = %e, "failed to load environment file");
        return ExitStatus::Configuration.into();
    }
    if let Err(e) = format {
        error!(kind = "configuration", error = %e, "configuration invalid");
        return ExitStatus::Configuration.into();
    }

    run(cli).await.into()
}

/// Load `path`, or `./.env` when present. Values override the inherited
/// environment.
fn load_env(path: Option<&Path>) -> Result<(), dotenvy::Error> {
    match path {
        Some(path) => dotenvy::from_path_override(path),
        None => match dotenvy::dotenv_override() {
            Ok(_) => Ok(()),
            Err(e) if e.not_found() => Ok(()),
            Err(e) => Err(e),
        },
    }
}

async fn run(cli: Cli) -> ExitStatus {
    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(kind = "configuration", error = %e, "configuration invalid");
            return ExitStatus::Configuration;
        }
    };
    config.override_questions(cli.questions);

    info!(
        pdf_file = %config.pdf_file.display(),
        embedding_model = %config.embedding_model,
        collection = %config.collection_name,
        model_name = %config.model_name,
        persistent_index = config.vector_db_path.is_some(),
        questions = config.questions.len(),
        "configuration loaded"
    );

    let pipeline = match build_pipeline(&config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(kind = e.kind().as_str(), error = %e, "failed to set up pipeline");
            return ExitStatus::from(&e);
        }
    };

    if let Err(e) = pipeline.check_dependencies().await {
        return ExitStatus::from(&e);
    }

    let system_info = tokio::task::spawn_blocking(host::system_info)
        .await
        .unwrap_or_else(|_| SystemInfo::unknown());
    let server_name = config.server_name.clone().unwrap_or_else(host::hostname);

    let mut ctx = RunContext::new();
    let request = RunRequest::new(&config.pdf_file, config.questions.clone())
        .with_server_name(server_name)
        .with_system_info(system_info);
    let outcome = pipeline.run(&mut ctx, request).await;

    for (stage, seconds) in ctx.timings().iter() {
        info!(run_id = %ctx.run_id(), stage = stage.key(), seconds, "stage timing");
    }
    info!(run_id = %ctx.run_id(), total_secs = ctx.timings().total(), "timing summary");

    match outcome {
        Ok(record) => {
            if cli.dry_run {
                info!(run_id = %ctx.run_id(), "dry run, record not stored");
            } else {
                store(&config, &record).await;
            }
            ExitStatus::Success
        }
        Err(e) => {
            let stage = ctx.failure().and_then(|(stage, _)| stage).map(|s| s.key());
            error!(
                run_id = %ctx.run_id(),
                stage = stage.unwrap_or("none"),
                kind = e.kind().as_str(),
                answered = ctx.partial_answers().len(),
                error = %e,
                "run failed"
            );
            ExitStatus::from(&e)
        }
    }
}

async fn build_pipeline(config: &AppConfig) -> Result<QaPipeline, RagError> {
    let rag_config = config.to_rag_config().map_err(|e| RagError::ConfigError(e.to_string()))?;

    let embedder = OllamaEmbeddingProvider::new(&config.ollama_host, &config.embedding_model)?;
    let model: Arc<dyn CompletionModel> =
        Arc::new(OllamaModel::new(&config.ollama_host, &config.model_name)?);
    let store: Arc<dyn VectorStore> = match &config.vector_db_path {
        Some(dir) => Arc::new(FileVectorStore::open(dir).await?),
        None => Arc::new(InMemoryVectorStore::new()),
    };

    let mut builder = QaPipeline::builder()
        .config(rag_config)
        .embedding_provider(Arc::new(embedder))
        .completion_model(model)
        .vector_store(store)
        .collection(&config.collection_name);
    if let Some(prompt) = &config.query_prompt {
        builder = builder.query_prompt(prompt.clone());
    }
    builder.build()
}

/// Hand the record to the configured sink. Failures are logged only.
async fn store(config: &AppConfig, record: &ResultRecord) {
    let sink: Box<dyn ResultSink> = match &config.firebase_url {
        Some(url) => match FirebaseSink::new(url, config.firebase_auth_token.clone()) {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                warn!(sink = "firebase", error = %e, "sink unavailable, printing record instead");
                Box::new(StdoutSink)
            }
        },
        None => Box::new(StdoutSink),
    };

    if let Err(e) = sink.write(record).await {
        warn!(sink = sink.name(), kind = "persistence", error = %e, "failed to store record");
    }
}
