use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::spec::schema::Schema;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("schema unavailable: {0}")]
    Unavailable(String),
    #[error("schema is malformed: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Supplies the questionnaire document.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn load(&self) -> Result<Schema, SourceError>;
}

/// Document held in memory.
#[derive(Debug, Clone)]
pub struct StaticSource {
    document: String,
}

impl StaticSource {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }
}

#[async_trait]
impl SchemaSource for StaticSource {
    async fn load(&self) -> Result<Schema, SourceError> {
        Schema::from_json(&self.document).map_err(SourceError::Malformed)
    }
}

/// Document read from a JSON file on every load.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SchemaSource for JsonFileSource {
    async fn load(&self) -> Result<Schema, SourceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| SourceError::Unavailable(format!("{}: {}", self.path.display(), err)))?;
        Schema::from_json(&text).map_err(SourceError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_source_reads_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("survey.json");
        std::fs::write(&path, r#"{ "perfil": [], "questions": [], "schools": ["S1"] }"#)
            .expect("write");
        let schema = JsonFileSource::new(&path).load().await.expect("load");
        assert_eq!(schema.choice_source("schools").expect("schools")[0].value, "S1");
    }

    #[tokio::test]
    async fn file_source_distinguishes_missing_and_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = JsonFileSource::new(dir.path().join("absent.json")).load().await;
        assert!(matches!(missing, Err(SourceError::Unavailable(_))));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2").expect("write");
        let broken = JsonFileSource::new(&path).load().await;
        assert!(matches!(broken, Err(SourceError::Malformed(_))));
    }
}
