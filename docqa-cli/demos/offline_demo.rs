//! Offline run of the full pipeline.
//!
//! Uses an in-memory document, the hashing mock embedder and a scripted
//! completion model, so no Ollama server is needed. Prints the result
//! record as JSON.
//!
//! ```text
//! cargo run -p docqa-cli --example offline_demo
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use docqa_model::MockModel;
use docqa_rag::{
    Document, DocumentLoader, MockEmbeddingProvider, QaPipeline, RagConfig, RawDocument,
    RunContext, RunRequest,
};
use docqa_telemetry::{LogFormat, init_telemetry};

const MANUAL: [&str; 3] = [
    "The coffee grinder ships with a two-year limited warranty. The warranty covers defects in \
     materials and workmanship under normal household use.\n\nThe warranty does not cover burr \
     wear, damage from grinding anything other than coffee beans, or commercial use.",
    "Cleaning: unplug the grinder and remove the hopper. Brush the burrs with the supplied \
     brush once a week.\n\nNever rinse the motor housing with water. Dry all removable parts \
     before reassembly.",
    "Grind settings range from 1 (espresso) to 40 (cold brew). Change the setting only while \
     the motor is running to avoid jamming the burrs.",
];

struct InMemoryLoader {
    pages: Vec<&'static str>,
}

#[async_trait]
impl DocumentLoader for InMemoryLoader {
    async fn load(&self, path: &Path) -> docqa_rag::Result<RawDocument> {
        let segments = self
            .pages
            .iter()
            .enumerate()
            .map(|(i, text)| Document {
                id: format!("manual_p{}", i + 1),
                text: text.to_string(),
                metadata: HashMap::from([("page".to_string(), (i + 1).to_string())]),
                source_uri: None,
            })
            .collect();
        Ok(RawDocument::new(path, segments))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(LogFormat::Text)?;

    let model = MockModel::new("mock-llm")
        .with_rule(
            "alternative versions",
            "What repairs does the warranty include?\nHow long is the grinder covered?",
        )
        .with_rule("Answer the question", "Two years, for defects in materials and workmanship.");

    let pipeline = QaPipeline::builder()
        .config(RagConfig::builder().chunk_size(200).chunk_overlap(40).top_k(2).build()?)
        .loader(Arc::new(InMemoryLoader { pages: MANUAL.to_vec() }))
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(64).with_model("mock-embed")))
        .completion_model(Arc::new(model))
        .collection("grinder-manual")
        .build()?;

    pipeline.check_dependencies().await?;

    let mut ctx = RunContext::new();
    let request = RunRequest::new("grinder-manual.txt", vec![
        "What does the warranty cover?".to_string(),
        "How do I clean the burrs?".to_string(),
    ])
    .with_server_name("offline-demo");
    let record = pipeline.run(&mut ctx, request).await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
