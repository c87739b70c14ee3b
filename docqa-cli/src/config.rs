//! Application configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use docqa_model::ollama::DEFAULT_OLLAMA_HOST;
use docqa_rag::{PromptTemplate, RagConfig};
use docqa_telemetry::LogFormat;
use thiserror::Error;

/// Keys that must be present before the pipeline starts.
pub const REQUIRED_KEYS: [&str; 4] = ["PDF_FILE", "EMBEDDING_MODEL", "COLLECTION_NAME", "MODEL_NAME"];

/// Question asked when neither `QUESTIONS` nor `--question` is given.
pub const DEFAULT_QUESTION: &str = "Genera un resumen del documento";

/// Errors raised while reading the configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid { key: key.to_string(), message: message.into() }
    }
}

/// Everything the binary needs to wire up and run the pipeline.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pdf_file: PathBuf,
    pub embedding_model: String,
    pub collection_name: String,
    pub model_name: String,
    pub vector_db_path: Option<PathBuf>,
    pub ollama_host: String,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub top_k: Option<usize>,
    pub stage_timeout: Option<Duration>,
    pub validate_inputs: bool,
    pub questions: Vec<String>,
    pub query_prompt: Option<PromptTemplate>,
    pub firebase_url: Option<String>,
    pub firebase_auth_token: Option<String>,
    pub server_name: Option<String>,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// Blank values count as missing. All missing required keys are
    /// reported together.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<String> =
            REQUIRED_KEYS.iter().filter(|key| get(**key).is_none()).map(|key| key.to_string()).collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let required = |key: &str| get(key).unwrap_or_default();

        let questions = match get("QUESTIONS") {
            Some(raw) => {
                let questions = split_questions(&raw);
                if questions.is_empty() {
                    return Err(ConfigError::invalid("QUESTIONS", "no question after splitting on '|'"));
                }
                questions
            }
            None => vec![DEFAULT_QUESTION.to_string()],
        };

        let query_prompt = get("QUERY_PROMPT")
            .map(|template| {
                PromptTemplate::query(template).map_err(|e| ConfigError::invalid("QUERY_PROMPT", e.to_string()))
            })
            .transpose()?;

        Ok(Self {
            pdf_file: PathBuf::from(required("PDF_FILE")),
            embedding_model: required("EMBEDDING_MODEL"),
            collection_name: required("COLLECTION_NAME"),
            model_name: required("MODEL_NAME"),
            vector_db_path: get("VECTOR_DB_PATH").map(PathBuf::from),
            ollama_host: get("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            chunk_size: parse_opt(&get, "CHUNK_SIZE")?,
            chunk_overlap: parse_opt(&get, "CHUNK_OVERLAP")?,
            top_k: parse_opt(&get, "TOP_K")?,
            stage_timeout: parse_opt::<u64>(&get, "STAGE_TIMEOUT_SECS")?.map(Duration::from_secs),
            validate_inputs: parse_bool(&get, "VALIDATE_INPUTS")?.unwrap_or(true),
            questions,
            query_prompt,
            firebase_url: get("FIREBASE_URL"),
            firebase_auth_token: get("FIREBASE_AUTH_TOKEN"),
            server_name: get("SERVER_NAME"),
        })
    }

    /// Replace the configured questions, ignoring blank entries.
    pub fn override_questions(&mut self, questions: Vec<String>) {
        let questions: Vec<String> =
            questions.into_iter().map(|q| q.trim().to_string()).filter(|q| !q.is_empty()).collect();
        if !questions.is_empty() {
            self.questions = questions;
        }
    }

    /// Pipeline options derived from this configuration.
    pub fn to_rag_config(&self) -> Result<RagConfig, ConfigError> {
        let mut builder = RagConfig::builder()
            .persist_index(self.vector_db_path.is_some())
            .validate_inputs(self.validate_inputs);
        if let Some(size) = self.chunk_size {
            builder = builder.chunk_size(size);
        }
        if let Some(overlap) = self.chunk_overlap {
            builder = builder.chunk_overlap(overlap);
        }
        if let Some(k) = self.top_k {
            builder = builder.top_k(k);
        }
        if let Some(timeout) = self.stage_timeout {
            builder = builder.stage_timeout(timeout);
        }
        builder.build().map_err(|e| ConfigError::invalid("pipeline", e.to_string()))
    }
}

/// Logging format selected by `LOG_FORMAT`, text when unset.
///
/// Read apart from [`AppConfig`] since the logger is installed before the
/// rest of the configuration is loaded.
pub fn log_format(lookup: impl Fn(&str) -> Option<String>) -> Result<LogFormat, ConfigError> {
    match lookup("LOG_FORMAT").map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().map_err(|e: String| ConfigError::invalid("LOG_FORMAT", e)),
        None => Ok(LogFormat::default()),
    }
}

fn split_questions(raw: &str) -> Vec<String> {
    raw.split('|').map(str::trim).filter(|q| !q.is_empty()).map(str::to_string).collect()
}

fn parse_opt<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| raw.parse::<T>().map_err(|e| ConfigError::invalid(key, format!("{raw:?}: {e}"))))
        .transpose()
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, ConfigError> {
    get(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, format!("{raw:?} is not a boolean"))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("PDF_FILE", "data/manual.pdf"),
        ("EMBEDDING_MODEL", "nomic-embed-text"),
        ("COLLECTION_NAME", "manual"),
        ("MODEL_NAME", "llama3.2"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        REQUIRED.iter().copied().chain(extra.iter().copied()).collect()
    }

    #[test]
    fn reports_every_missing_key_at_once() {
        let err = AppConfig::from_lookup(lookup(&[("PDF_FILE", "a.pdf"), ("MODEL_NAME", " ")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec![
                "EMBEDDING_MODEL".to_string(),
                "COLLECTION_NAME".to_string(),
                "MODEL_NAME".to_string(),
            ])
        );
        assert!(err.to_string().contains("EMBEDDING_MODEL, COLLECTION_NAME, MODEL_NAME"));
    }

    #[test]
    fn defaults_apply_when_optional_keys_are_absent() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.pdf_file, PathBuf::from("data/manual.pdf"));
        assert_eq!(config.ollama_host, DEFAULT_OLLAMA_HOST);
        assert_eq!(config.questions, vec![DEFAULT_QUESTION.to_string()]);
        assert!(config.validate_inputs);
        assert!(config.vector_db_path.is_none());
        assert!(config.query_prompt.is_none());

        let rag = config.to_rag_config().unwrap();
        assert_eq!(rag.chunk_size, 1200);
        assert_eq!(rag.chunk_overlap, 300);
        assert_eq!(rag.top_k, 4);
        assert!(!rag.persist_index);
    }

    #[test]
    fn optional_keys_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&with(&[
            ("VECTOR_DB_PATH", "/var/lib/docqa"),
            ("CHUNK_SIZE", "800"),
            ("CHUNK_OVERLAP", "100"),
            ("TOP_K", "6"),
            ("STAGE_TIMEOUT_SECS", "30"),
            ("VALIDATE_INPUTS", "false"),
            ("QUESTIONS", "What is covered? | | How do I clean it?"),
        ])))
        .unwrap();

        assert_eq!(config.questions, vec!["What is covered?", "How do I clean it?"]);
        let rag = config.to_rag_config().unwrap();
        assert_eq!((rag.chunk_size, rag.chunk_overlap, rag.top_k), (800, 100, 6));
        assert_eq!(rag.stage_timeout, Some(Duration::from_secs(30)));
        assert!(rag.persist_index);
        assert!(!rag.validate_inputs);
    }

    #[test]
    fn log_format_is_read_apart_from_the_rest() {
        assert_eq!(log_format(lookup(&[])), Ok(LogFormat::Text));
        assert_eq!(log_format(lookup(&[("LOG_FORMAT", " JSON ")])), Ok(LogFormat::Json));
        assert!(matches!(
            log_format(lookup(&[("LOG_FORMAT", "xml")])),
            Err(ConfigError::Invalid { ref key, .. }) if key == "LOG_FORMAT"
        ));

        // The logger has already rejected it, so loading does not repeat the error.
        assert!(AppConfig::from_lookup(lookup(&with(&[("LOG_FORMAT", "xml")]))).is_ok());
    }

    #[test]
    fn malformed_numbers_name_the_key() {
        let err = AppConfig::from_lookup(lookup(&with(&[("TOP_K", "four")]))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "TOP_K"));
    }

    #[test]
    fn query_prompt_must_mention_the_question() {
        let err = AppConfig::from_lookup(lookup(&with(&[("QUERY_PROMPT", "Rephrase this")]))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "QUERY_PROMPT"));

        let config =
            AppConfig::from_lookup(lookup(&with(&[("QUERY_PROMPT", "Rephrase: {question}")]))).unwrap();
        assert!(config.query_prompt.is_some());
    }

    #[test]
    fn overlap_not_below_size_is_rejected_when_building_pipeline_options() {
        let config = AppConfig::from_lookup(lookup(&with(&[("CHUNK_SIZE", "100"), ("CHUNK_OVERLAP", "100")])))
            .unwrap();
        assert!(config.to_rag_config().is_err());
    }

    #[test]
    fn command_line_questions_replace_configured_ones() {
        let mut config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        config.override_questions(vec![" ".to_string()]);
        assert_eq!(config.questions, vec![DEFAULT_QUESTION.to_string()]);

        config.override_questions(vec!["First?".to_string(), "Second?".to_string()]);
        assert_eq!(config.questions, vec!["First?", "Second?"]);
    }
}
