//! Result record types and the aggregator that builds them.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize, Serializer};

use crate::context::StageTimings;

/// Human-readable timestamp written into the record body.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Timestamp format of the storage key (microsecond precision).
pub const STORAGE_KEY_FORMAT: &str = "%Y%m%d%H%M%S%6f";

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswerPair {
    pub question: String,
    pub answer: String,
}

impl QuestionAnswerPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// Models used for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub embedding_model: String,
}

impl ModelInfo {
    pub fn new(model_name: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self { model_name: model_name.into(), embedding_model: embedding_model.into() }
    }
}

/// Disk usage in gigabytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskSpace {
    pub total: f64,
    pub used: f64,
    pub free: f64,
}

/// Snapshot of host facts, collected once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub operating_system: String,
    pub version: String,
    pub architecture: String,
    pub processor: String,
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub ram_gb: f64,
    pub disk_space_gb: DiskSpace,
    pub app_version: String,
    pub gpu: String,
    pub gpu_count: usize,
}

impl SystemInfo {
    /// Placeholder values for hosts that cannot be inspected.
    pub fn unknown() -> Self {
        Self {
            operating_system: "unknown".to_string(),
            version: "unknown".to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            processor: "unknown".to_string(),
            physical_cores: 0,
            logical_cores: 0,
            ram_gb: 0.0,
            disk_space_gb: DiskSpace::default(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            gpu: "No GPU detected".to_string(),
            gpu_count: 0,
        }
    }
}

/// Everything a run produced, ready for the persistence sink.
///
/// Built once by [`aggregate`]; fields are read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord {
    server_name: String,
    #[serde(rename = "timestamp", serialize_with = "serialize_timestamp")]
    created_at: DateTime<Local>,
    server_data: SystemInfo,
    performance_data: StageTimings,
    model_info: ModelInfo,
    questions_and_answers: Vec<QuestionAnswerPair>,
}

fn serialize_timestamp<S: Serializer>(
    created_at: &DateTime<Local>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&created_at.format(TIMESTAMP_FORMAT))
}

impl ResultRecord {
    /// Build a record stamped with `created_at`.
    pub fn new(
        server_name: impl Into<String>,
        created_at: DateTime<Local>,
        server_data: SystemInfo,
        performance_data: StageTimings,
        model_info: ModelInfo,
        questions_and_answers: Vec<QuestionAnswerPair>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            created_at,
            server_data,
            performance_data,
            model_info,
            questions_and_answers,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    /// The `timestamp` field as written in the record body.
    pub fn timestamp(&self) -> String {
        self.created_at.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Key under which the record is stored, unique per microsecond.
    pub fn storage_key(&self) -> String {
        self.created_at.format(STORAGE_KEY_FORMAT).to_string()
    }

    pub fn server_data(&self) -> &SystemInfo {
        &self.server_data
    }

    pub fn performance_data(&self) -> &StageTimings {
        &self.performance_data
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    pub fn questions_and_answers(&self) -> &[QuestionAnswerPair] {
        &self.questions_and_answers
    }
}

/// Assemble the final record, stamping it with the current wall-clock time.
pub fn aggregate(
    server_name: impl Into<String>,
    system_info: SystemInfo,
    timings: StageTimings,
    model_info: ModelInfo,
    questions_and_answers: Vec<QuestionAnswerPair>,
) -> ResultRecord {
    ResultRecord::new(
        server_name,
        Local::now(),
        system_info,
        timings,
        model_info,
        questions_and_answers,
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::context::Stage;

    fn record_at(created_at: DateTime<Local>) -> ResultRecord {
        let mut timings = StageTimings::new();
        timings.record(Stage::Ingest, 0.25);
        timings.record(Stage::Answer, 3.5);
        ResultRecord::new(
            "bench-01",
            created_at,
            SystemInfo::unknown(),
            timings,
            ModelInfo::new("llama3.2", "nomic-embed-text"),
            vec![QuestionAnswerPair::new("Q1", "A1"), QuestionAnswerPair::new("Q2", "A2")],
        )
    }

    #[test]
    fn serializes_to_the_stored_shape() {
        let created_at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).single().unwrap();
        let value = serde_json::to_value(record_at(created_at)).unwrap();

        assert_eq!(value["server_name"], "bench-01");
        assert_eq!(value["timestamp"], "2024-03-09 14:05:07");
        assert_eq!(value["performance_data"]["ingest"], 0.25);
        assert_eq!(value["performance_data"]["answer"], 3.5);
        assert_eq!(value["model_info"]["embedding_model"], "nomic-embed-text");
        assert_eq!(value["server_data"]["disk_space_gb"]["free"], 0.0);
        assert_eq!(value["questions_and_answers"][1]["question"], "Q2");
        assert_eq!(value.as_object().unwrap().len(), 6);
    }

    #[test]
    fn storage_key_has_microsecond_precision() {
        let created_at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).single().unwrap()
            + chrono::Duration::microseconds(42);
        assert_eq!(record_at(created_at).storage_key(), "20240309140507000042");
    }

    #[test]
    fn aggregate_stamps_at_call_time_and_keeps_order() {
        let before = Local::now();
        let record = aggregate(
            "host",
            SystemInfo::unknown(),
            StageTimings::new(),
            ModelInfo::new("m", "e"),
            vec![QuestionAnswerPair::new("first", "1"), QuestionAnswerPair::new("second", "2")],
        );
        assert!(record.created_at() >= before);
        let questions: Vec<_> =
            record.questions_and_answers().iter().map(|qa| qa.question.as_str()).collect();
        assert_eq!(questions, vec!["first", "second"]);
    }
}
