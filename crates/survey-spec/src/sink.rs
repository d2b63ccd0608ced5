use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::answers::Submission;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("submission store unavailable: {0}")]
    Unavailable(String),
}

/// Persists finished submissions. One call per attempt, no batching.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn insert(&self, record: &Submission) -> Result<(), SinkError>;
}

/// Keeps every inserted record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Submission>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Submission> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SubmissionSink for MemorySink {
    async fn insert(&self, record: &Submission) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// Appends one JSON document per line.
#[derive(Debug, Clone)]
pub struct JsonlFileSink {
    path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SubmissionSink for JsonlFileSink {
    async fn insert(&self, record: &Submission) -> Result<(), SinkError> {
        let mut line =
            serde_json::to_string(record).map_err(|err| SinkError::Rejected(err.to_string()))?;
        line.push('\n');
        let unavailable =
            |err: std::io::Error| SinkError::Unavailable(format!("{}: {}", self.path.display(), err));
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(unavailable)?;
        file.write_all(line.as_bytes()).await.map_err(unavailable)?;
        file.flush().await.map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::{AnswerMap, AnswerValue};

    fn submission() -> Submission {
        Submission {
            profile: AnswerMap::from([("funcao".into(), AnswerValue::Scalar("Docente".into()))]),
            responses: AnswerMap::new(),
        }
    }

    #[tokio::test]
    async fn jsonl_sink_appends_one_line_per_insert() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("submissions.jsonl");
        let sink = JsonlFileSink::new(&path);
        sink.insert(&submission()).await.expect("first insert");
        sink.insert(&submission()).await.expect("second insert");

        let contents = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: Submission = serde_json::from_str(lines[0]).expect("parse");
        assert_eq!(parsed, submission());
    }

    #[tokio::test]
    async fn jsonl_sink_reports_unavailable_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = JsonlFileSink::new(dir.path().join("missing").join("out.jsonl"));
        let err = sink.insert(&submission()).await.expect_err("should fail");
        assert!(matches!(err, SinkError::Unavailable(_)));
    }
}
