//! Persistence sinks for finished result records.
//!
//! A sink write is best effort: the caller logs a [`SinkError`] and keeps
//! the run's exit status.

use std::time::Duration;

use async_trait::async_trait;
use docqa_rag::ResultRecord;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned {status}: {body}")]
    Rejected { url: String, status: u16, body: String },

    #[error("failed to write record: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for a finished [`ResultRecord`].
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &str;

    async fn write(&self, record: &ResultRecord) -> Result<(), SinkError>;
}

/// Writes records to a Firebase Realtime Database over its REST API.
///
/// Each record lands at `{base_url}/{server_name}/{storage_key}.json`.
pub struct FirebaseSink {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl FirebaseSink {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self, SinkError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::Request { url: base_url.clone(), message: e.to_string() })?;
        Ok(Self { client, base_url, auth_token })
    }

    /// Location of `record`, without the auth query parameter.
    pub fn record_url(&self, record: &ResultRecord) -> String {
        format!(
            "{}/{}/{}.json",
            self.base_url,
            path_segment(record.server_name()),
            record.storage_key()
        )
    }
}

#[async_trait]
impl ResultSink for FirebaseSink {
    fn name(&self) -> &str {
        "firebase"
    }

    async fn write(&self, record: &ResultRecord) -> Result<(), SinkError> {
        let url = self.record_url(record);
        let mut request = self.client.put(&url).json(record);
        if let Some(token) = &self.auth_token {
            request = request.query(&[("auth", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Request { url: url.clone(), message: e.without_url().to_string() })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected { url, status: status.as_u16(), body });
        }

        info!(sink = "firebase", url = %url, "record stored");
        Ok(())
    }
}

/// Prints records as pretty JSON on stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl ResultSink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn write(&self, record: &ResultRecord) -> Result<(), SinkError> {
        use tokio::io::AsyncWriteExt;

        let mut json = serde_json::to_vec_pretty(record)?;
        json.push(b'\n');
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&json).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Firebase keys may not contain `.`, `$`, `#`, `[`, `]` or `/`.
fn path_segment(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '.' | '$' | '#' | '[' | ']' | '/') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use docqa_rag::{ModelInfo, QuestionAnswerPair, StageTimings, SystemInfo, aggregate};

    use super::*;

    fn record(server: &str) -> ResultRecord {
        aggregate(
            server,
            SystemInfo::unknown(),
            StageTimings::new(),
            ModelInfo::new("llama3.2", "nomic-embed-text"),
            vec![QuestionAnswerPair::new("q", "a")],
        )
    }

    #[test]
    fn record_url_uses_server_and_storage_key() {
        let sink = FirebaseSink::new("https://demo.firebaseio.com/", None).unwrap();
        let record = record("bench-01");
        assert_eq!(
            sink.record_url(&record),
            format!("https://demo.firebaseio.com/bench-01/{}.json", record.storage_key())
        );
    }

    #[test]
    fn server_names_are_made_key_safe() {
        assert_eq!(path_segment("node.example.com"), "node_example_com");
        assert_eq!(path_segment("a/b#c"), "a_b_c");
        assert_eq!(path_segment("plain-host"), "plain-host");
    }

    #[tokio::test]
    async fn unreachable_database_is_a_request_error() {
        let sink = FirebaseSink::new("http://127.0.0.1:9", Some("secret".to_string())).unwrap();
        let err = sink.write(&record("bench-01")).await.unwrap_err();
        assert!(matches!(err, SinkError::Request { ref url, .. } if url.contains("/bench-01/")));
        assert!(!err.to_string().contains("secret"));
    }
}
