use std::path::PathBuf;

use thiserror::Error;

/// Failures a pipeline stage can report. Any of them fails the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source database {path:?} unavailable: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("query on table '{table}' failed: {reason}")]
    QueryError { table: String, reason: String },

    #[error("malformed artifact {path:?}: {reason}")]
    MalformedInput { path: PathBuf, reason: String },

    #[error("cannot impute column '{column}': no non-null values to take a median from")]
    ImputationError { column: String },

    #[error("search index at {endpoint} unreachable: {reason}")]
    IndexUnavailable { endpoint: String, reason: String },

    #[error("index rejected document {record} (HTTP {status}): {reason}")]
    DocumentRejected {
        record: usize,
        status: u16,
        reason: String,
    },

    #[error("artifact I/O on {path:?}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn artifact(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Artifact {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::MalformedInput {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Short category name used in logs and the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SourceUnavailable { .. } => "SourceUnavailable",
            PipelineError::QueryError { .. } => "QueryError",
            PipelineError::MalformedInput { .. } => "MalformedInput",
            PipelineError::ImputationError { .. } => "ImputationError",
            PipelineError::IndexUnavailable { .. } => "IndexUnavailable",
            PipelineError::DocumentRejected { .. } => "DocumentRejected",
            PipelineError::Artifact { .. } => "Artifact",
        }
    }
}
