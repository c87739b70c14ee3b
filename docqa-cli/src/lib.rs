//! # docqa-cli
//!
//! Support code for the `docqa` binary: environment configuration, host
//! introspection, result sinks and exit-status mapping.
//!
//! ## Environment
//!
//! | Key | Required | Meaning |
//! |-----|----------|---------|
//! | `PDF_FILE` | yes | Document to question |
//! | `EMBEDDING_MODEL` | yes | Ollama embedding model |
//! | `COLLECTION_NAME` | yes | Vector store collection |
//! | `MODEL_NAME` | yes | Ollama completion model |
//! | `VECTOR_DB_PATH` | no | Directory of the persistent index |
//! | `OLLAMA_HOST` | no | Ollama base URL |
//! | `QUESTIONS` | no | `|`-separated questions |
//! | `FIREBASE_URL` | no | Realtime Database URL; stdout when unset |
//!
//! See [`config::AppConfig`] for the full list.

pub mod config;
pub mod exit;
pub mod host;
pub mod sink;

pub use config::{AppConfig, ConfigError};
pub use exit::ExitStatus;
pub use sink::{FirebaseSink, ResultSink, SinkError, StdoutSink};
