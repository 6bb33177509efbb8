use std::path::PathBuf;
use thiserror::Error;

/// Result type used across the pipeline
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors that can occur while linking, selecting and relocating events
///
/// Only `Configuration` and `NoOutput` end a run. The rest are recovered at
/// the smallest enclosing unit (line, pair, partition) and counted.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Missing reference: {kind} '{id}' not found")]
    MissingReference { kind: &'static str, id: String },

    #[error("Partition {partition} failed: {reason}")]
    PartitionFailure { partition: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No partition produced any relocated event")]
    NoOutput,
}

impl LinkError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        LinkError::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LinkError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Configuration(_) | LinkError::NoOutput)
    }
}

impl From<config::ConfigError> for LinkError {
    fn from(err: config::ConfigError) -> Self {
        LinkError::Configuration(err.to_string())
    }
}

impl From<validator::ValidationErrors> for LinkError {
    fn from(err: validator::ValidationErrors) -> Self {
        LinkError::Configuration(err.to_string())
    }
}
