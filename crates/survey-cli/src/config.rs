use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const SCHEMA_ENV: &str = "SURVEY_SCHEMA_PATH";
pub const OUTPUT_ENV: &str = "SURVEY_OUTPUT_PATH";
pub const LOG_ENV: &str = "SURVEY_LOG";

const DEFAULT_OUTPUT: &str = "submissions.jsonl";
const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no schema given; pass --schema or set SURVEY_SCHEMA_PATH")]
    MissingSchema,
    #[error("{0} cannot be empty")]
    EmptyPath(&'static str),
}

/// Settings for an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub schema: PathBuf,
    pub output: PathBuf,
}

impl RunnerConfig {
    /// Flags win over environment variables; the output falls back to `submissions.jsonl`.
    pub fn resolve(schema: Option<PathBuf>, output: Option<PathBuf>) -> Result<Self, ConfigError> {
        let schema = schema
            .or_else(|| env::var_os(SCHEMA_ENV).map(PathBuf::from))
            .ok_or(ConfigError::MissingSchema)?;
        let output = output
            .or_else(|| env::var_os(OUTPUT_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        if schema.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("schema path"));
        }
        if output.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("output path"));
        }
        Ok(Self { schema, output })
    }
}

/// Log filter used when `RUST_LOG` is not set.
pub fn log_level(flag: Option<String>) -> String {
    flag.or_else(|| env::var(LOG_ENV).ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}
