// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Feature engineering stage: TF-IDF vectors from normalized text
//!
//! Fits the vocabulary on the processed training partition only, then writes
//! `processed/train_tfidf.csv`, `processed/test_tfidf.csv` and the feature
//! schema that tells evaluation which columns are features and which is the label.

use crate::config::{Configuration, DataLayout};
use crate::error::{PipelineError, Result};
use crate::table::{self, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// File name of the feature schema, next to the feature tables
pub const SCHEMA_FILE: &str = "feature_schema.json";

/// Name of the label column in feature tables
pub const LABEL_COLUMN: &str = "label";

/// Prefix of every TF-IDF feature column
pub const FEATURE_PREFIX: &str = "tfidf_";

/// Named feature columns and the label column of a numeric dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub features: Vec<String>,
    pub label: String,
}

impl FeatureSchema {
    /// Read a schema file written by the feature stage
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| PipelineError::io("load_feature_schema", path, e))?;
        serde_json::from_str(&raw).map_err(|e| {
            PipelineError::data_source(
                "load_feature_schema",
                &path.display().to_string(),
                format!("invalid feature schema: {}", e),
            )
        })
    }

    /// Schema assumed when no schema file exists: `label` plus every other column
    pub fn infer(columns: &[String]) -> Self {
        Self {
            features: columns.iter().filter(|c| *c != LABEL_COLUMN).cloned().collect(),
            label: LABEL_COLUMN.to_string(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io("save_feature_schema", parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            PipelineError::io("save_feature_schema", path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(path, json).map_err(|e| PipelineError::io("save_feature_schema", path, e))?;
        tracing::debug!("Feature schema saved to {}", path.display());
        Ok(())
    }
}

/// Term frequency times smoothed inverse document frequency, L2-normalized
#[derive(Debug, Clone, PartialEq)]
pub struct TfIdfVectorizer {
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    /// Fit on whitespace-tokenized documents.
    ///
    /// Keeps the `max_features` terms with the highest total count (ties go to
    /// the lexicographically smaller term) and stores them sorted.
    pub fn fit<'a, I>(documents: I, max_features: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut n_docs = 0usize;

        for doc in documents {
            n_docs += 1;
            let mut seen: Vec<&str> = Vec::new();
            for term in doc.split_whitespace() {
                *counts.entry(term).or_default() += 1;
                if !seen.contains(&term) {
                    seen.push(term);
                    *doc_freq.entry(term).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);

        let mut vocabulary: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        vocabulary.sort();

        let n = n_docs as f64;
        let idf = vocabulary
            .iter()
            .map(|t| {
                let df = doc_freq.get(t.as_str()).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let index = vocabulary.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();

        Self { vocabulary, index, idf }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// Vectorize one document; out-of-vocabulary terms are ignored
    pub fn transform(&self, document: &str) -> Vec<f64> {
        let mut row = vec![0.0; self.vocabulary.len()];
        for term in document.split_whitespace() {
            if let Some(&i) = self.index.get(term) {
                row[i] += 1.0;
            }
        }
        for (value, idf) in row.iter_mut().zip(&self.idf) {
            *value *= idf;
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut row {
                *value /= norm;
            }
        }
        row
    }

    /// Feature column names, in vocabulary order
    pub fn feature_names(&self) -> Vec<String> {
        self.vocabulary.iter().map(|t| format!("{}{}", FEATURE_PREFIX, t)).collect()
    }

    /// Build the numeric table for a processed partition
    pub fn transform_table(&self, table: &Table, text_column: &str, target_column: &str) -> Result<Table> {
        let text_idx = table.require_column(text_column, "transform_features")?;
        let target_idx = table.require_column(target_column, "transform_features")?;

        let mut columns = self.feature_names();
        columns.push(LABEL_COLUMN.to_string());

        let rows = table
            .rows()
            .iter()
            .map(|row| {
                let mut out: Vec<String> = self.transform(&row[text_idx]).iter().map(|v| v.to_string()).collect();
                out.push(row[target_idx].clone());
                out
            })
            .collect();
        Ok(Table::new(columns, rows))
    }
}

/// Feature parameters; column names are shared with preprocessing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureParams {
    pub max_features: usize,
    pub text_column: String,
    pub target_column: String,
}

impl FeatureParams {
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let max_features = config.usize_or("feature_engineering.max_features", 50)?;
        if max_features == 0 {
            return Err(PipelineError::config(
                "read_config",
                "feature_engineering.max_features must be at least 1",
            ));
        }
        Ok(Self {
            max_features,
            text_column: config.str_or("data_preprocessing.text_column", "text")?,
            target_column: config.str_or("data_preprocessing.target_column", "target")?,
        })
    }
}

/// Outcome of one feature run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSummary {
    pub vocabulary_size: usize,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Run the feature stage end to end
pub fn run(config: &Configuration, layout: &DataLayout) -> Result<FeatureSummary> {
    let params = FeatureParams::from_config(config)?;
    let train = Table::read_csv(&layout.interim_train(), "load_processed")?;
    let test = Table::read_csv(&layout.interim_test(), "load_processed")?;

    let text_idx = train.require_column(&params.text_column, "fit_features")?;
    let vectorizer = TfIdfVectorizer::fit(train.column(text_idx), params.max_features);
    if vectorizer.vocabulary().is_empty() {
        tracing::warn!("Training text is empty after normalization; vocabulary has no terms");
    }
    tracing::debug!("Vocabulary fitted: {} terms", vectorizer.vocabulary().len());

    let train_features = vectorizer.transform_table(&train, &params.text_column, &params.target_column)?;
    let test_features = vectorizer.transform_table(&test, &params.text_column, &params.target_column)?;

    table::persist_all(
        &layout.processed_dir(),
        &[("train_tfidf.csv", &train_features), ("test_tfidf.csv", &test_features)],
        "persist_features",
    )?;
    FeatureSchema {
        features: vectorizer.feature_names(),
        label: LABEL_COLUMN.to_string(),
    }
    .save(&layout.feature_schema())?;

    tracing::info!(
        "Feature engineering complete: {} terms, {} train / {} test rows",
        vectorizer.vocabulary().len(),
        train_features.len(),
        test_features.len()
    );
    Ok(FeatureSummary {
        vocabulary_size: vectorizer.vocabulary().len(),
        train_rows: train_features.len(),
        test_rows: test_features.len(),
    })
}
