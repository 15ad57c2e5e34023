// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Batch pipeline for labelled text classification data
//!
//! This crate provides:
//! - Dataset ingestion with a seeded train/test split
//! - Preprocessing: label encoding, deduplication and text normalization
//! - TF-IDF feature engineering with an explicit feature schema
//! - Model evaluation (Accuracy, Precision, Recall, AUC-ROC)
//! - Per-stage logging contexts and typed errors with stable exit codes

pub mod config;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod ingestion;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod preprocessing;
pub mod table;
pub mod telemetry;
pub mod text;

pub use config::{Configuration, DataLayout};
pub use error::{ErrorKind, PipelineError, Result};
pub use features::{FeatureSchema, TfIdfVectorizer};
pub use metrics::{ConfusionMatrix, MetricsReport};
pub use model::{load_model, Classifier, ModelArtifact};
pub use pipeline::{run_all, run_stage, PipelineOptions, Stage};
pub use preprocessing::{LabelMap, LabelOrder};
pub use table::Table;
pub use telemetry::{LogContext, LogSinks};
pub use text::{PorterStemmer, Stemmer, StopWords, TextNormalizer};
