// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error taxonomy shared by every stage
//!
//! Every variant is fatal for the stage that raised it. Nothing in the crate
//! retries; the stage entry point logs the error and maps its kind to a process
//! exit code so an orchestrator can branch on the cause.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline failure, carrying the operation and the offending key, path or column
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error in {op}: {detail}")]
    Configuration { op: &'static str, detail: String },

    #[error("data source error in {op} ({source_uri}): {detail}")]
    DataSource {
        op: &'static str,
        source_uri: String,
        detail: String,
    },

    #[error("schema error in {op}: column '{column}' not found")]
    Schema { op: &'static str, column: String },

    #[error("failed to load model from {}: {detail}", path.display())]
    ModelLoad { path: PathBuf, detail: String },

    #[error("evaluation error in {op}: {detail}")]
    Evaluation { op: &'static str, detail: String },

    #[error("io error in {op} ({}): {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error category, stable across releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    DataSource,
    Schema,
    ModelLoad,
    Evaluation,
    Io,
}

impl ErrorKind {
    /// Process exit code for this kind. 0 is success, 1 belongs to usage errors.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::DataSource => 3,
            ErrorKind::Schema => 4,
            ErrorKind::ModelLoad => 5,
            ErrorKind::Evaluation => 6,
            ErrorKind::Io => 7,
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration { .. } => ErrorKind::Configuration,
            PipelineError::DataSource { .. } => ErrorKind::DataSource,
            PipelineError::Schema { .. } => ErrorKind::Schema,
            PipelineError::ModelLoad { .. } => ErrorKind::ModelLoad,
            PipelineError::Evaluation { .. } => ErrorKind::Evaluation,
            PipelineError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn config(op: &'static str, detail: impl Into<String>) -> Self {
        PipelineError::Configuration {
            op,
            detail: detail.into(),
        }
    }

    pub fn data_source(op: &'static str, source_uri: &str, detail: impl Into<String>) -> Self {
        PipelineError::DataSource {
            op,
            source_uri: source_uri.to_string(),
            detail: detail.into(),
        }
    }

    pub fn schema(op: &'static str, column: &str) -> Self {
        PipelineError::Schema {
            op,
            column: column.to_string(),
        }
    }

    pub fn model_load(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        PipelineError::ModelLoad {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn evaluation(op: &'static str, detail: impl Into<String>) -> Self {
        PipelineError::Evaluation {
            op,
            detail: detail.into(),
        }
    }

    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
