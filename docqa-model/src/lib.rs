//! # docqa-model
//!
//! Text-completion models for the docqa pipeline.
//!
//! ## Overview
//!
//! The pipeline only needs one capability from a language model: turn a
//! prompt into text. That capability is the [`CompletionModel`] trait.
//! This crate ships:
//!
//! - [`OllamaModel`] - a local Ollama server via `/api/generate` (feature `ollama`)
//! - [`MockModel`] - scripted responses for tests and offline demos
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docqa_model::{CompletionModel, OllamaModel};
//!
//! let model = OllamaModel::new("http://localhost:11434", "llama3.2")?;
//! model.health_check().await?;
//! let text = model.complete("Say hello").await?;
//! ```

pub mod error;
pub mod mock;
pub mod model;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use error::{ModelError, Result};
pub use mock::MockModel;
pub use model::CompletionModel;
#[cfg(feature = "ollama")]
pub use ollama::OllamaModel;
