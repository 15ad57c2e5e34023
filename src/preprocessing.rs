// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Preprocessing stage: label encoding, deduplication and text normalization
//!
//! Reads `raw/train.csv` and `raw/test.csv`, writes
//! `interim/train_processed.csv` and `interim/test_processed.csv`.

use crate::config::{Configuration, DataLayout};
use crate::error::{PipelineError, Result};
use crate::table::{self, Table};
use crate::text::{Stemmer, StopWords, TextNormalizer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How distinct labels are assigned their integer index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOrder {
    /// Order of first appearance in the column
    #[default]
    FirstSeen,
    /// Sorted label values
    Lexicographic,
}

impl LabelOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "first_seen" => Some(LabelOrder::FirstSeen),
            "lexicographic" => Some(LabelOrder::Lexicographic),
            _ => None,
        }
    }
}

/// Label value to class index; the index is the position in `labels`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    /// Distinct values in the requested order
    pub fn fit<'a, I>(values: I, order: LabelOrder) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut map = Self::default();
        map.extend(values);
        if order == LabelOrder::Lexicographic {
            map.labels.sort();
        }
        map
    }

    /// Append values not yet mapped, in first-seen order; returns the new ones
    pub fn extend<'a, I>(&mut self, values: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: HashSet<String> = self.labels.iter().cloned().collect();
        let mut added = Vec::new();
        for value in values {
            if seen.insert(value.to_string()) {
                self.labels.push(value.to_string());
                added.push(value.to_string());
            }
        }
        added
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Replace the target column with class indices from this map.
    ///
    /// A value the map does not know is a configuration error; the table is
    /// left untouched in that case.
    pub fn apply(&self, table: &mut Table, target_column: &str) -> Result<()> {
        let idx = table.require_column(target_column, "encode_target")?;
        let index: HashMap<&str, usize> = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        if let Some(unknown) = table.column(idx).find(|value| !index.contains_key(value)) {
            return Err(PipelineError::config(
                "encode_target",
                format!("label '{}' in column '{}' has no class index", unknown, target_column),
            ));
        }
        table.map_column(idx, |value| index.get(value).copied().unwrap_or_default().to_string());
        Ok(())
    }
}

/// Replace the target column with integer class indices
pub fn encode_target(
    mut table: Table,
    target_column: &str,
    order: LabelOrder,
) -> Result<(Table, LabelMap)> {
    let idx = table.require_column(target_column, "encode_target")?;
    let labels = LabelMap::fit(table.column(idx), order);
    labels.apply(&mut table, target_column)?;
    tracing::debug!("Target column '{}' encoded into {} classes", target_column, labels.labels().len());
    Ok((table, labels))
}

/// Drop rows equal to an earlier row, keeping first occurrences in order
pub fn deduplicate(mut table: Table) -> Table {
    let keep: Vec<bool> = {
        let mut seen: HashSet<&[String]> = HashSet::with_capacity(table.len());
        table.rows().iter().map(|row| seen.insert(row.as_slice())).collect()
    };
    let before = table.len();
    table.retain_rows(|i, _| keep[i]);
    tracing::debug!("Duplicates removed: {} -> {} rows", before, table.len());
    table
}

fn require_columns(table: &Table, text_column: &str, target_column: &str) -> Result<usize> {
    let text_idx = table.require_column(text_column, "preprocess")?;
    table.require_column(target_column, "preprocess")?;
    Ok(text_idx)
}

/// Encode with an existing label map, deduplicate, then normalize the text column
pub fn preprocess_with_labels<S: Stemmer, W: StopWords>(
    mut table: Table,
    text_column: &str,
    target_column: &str,
    labels: &LabelMap,
    normalizer: &TextNormalizer<S, W>,
) -> Result<Table> {
    tracing::debug!("Starting preprocessing for {} rows", table.len());
    let text_idx = require_columns(&table, text_column, target_column)?;

    labels.apply(&mut table, target_column)?;
    let mut table = deduplicate(table);
    table.map_column(text_idx, |text| normalizer.normalize(text));
    tracing::debug!("Text column '{}' transformed", text_column);
    Ok(table)
}

/// Encode, deduplicate, then normalize the text column.
///
/// Both columns are checked before any work is done.
pub fn preprocess<S: Stemmer, W: StopWords>(
    table: Table,
    text_column: &str,
    target_column: &str,
    order: LabelOrder,
    normalizer: &TextNormalizer<S, W>,
) -> Result<(Table, LabelMap)> {
    require_columns(&table, text_column, target_column)?;
    let target_idx = table.require_column(target_column, "preprocess")?;
    let labels = LabelMap::fit(table.column(target_idx), order);
    let table = preprocess_with_labels(table, text_column, target_column, &labels, normalizer)?;
    Ok((table, labels))
}

/// Write both processed partitions under `interim/`, all or nothing
pub fn persist(train: &Table, test: &Table, layout: &DataLayout) -> Result<()> {
    let dir = layout.interim_dir();
    table::persist_all(
        &dir,
        &[("train_processed.csv", train), ("test_processed.csv", test)],
        "persist_processed",
    )?;
    tracing::debug!("Processed data saved to {}", dir.display());
    Ok(())
}

/// Preprocessing parameters from the `data_preprocessing` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessingParams {
    pub text_column: String,
    pub target_column: String,
    pub label_order: LabelOrder,
}

impl PreprocessingParams {
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let order = config.str_or("data_preprocessing.label_order", "first_seen")?;
        let label_order = LabelOrder::parse(&order).ok_or_else(|| {
            PipelineError::config(
                "read_config",
                format!(
                    "data_preprocessing.label_order must be 'first_seen' or 'lexicographic', got '{}'",
                    order
                ),
            )
        })?;
        Ok(Self {
            text_column: config.str_or("data_preprocessing.text_column", "text")?,
            target_column: config.str_or("data_preprocessing.target_column", "target")?,
            label_order,
        })
    }
}

/// Row counts and the shared label map of one preprocessing run
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingSummary {
    pub train_rows_in: usize,
    pub train_rows_out: usize,
    pub test_rows_in: usize,
    pub test_rows_out: usize,
    pub labels: LabelMap,
}

/// Run the preprocessing stage end to end.
///
/// The label map is fitted on the training partition and applied to both, so a
/// label keeps its index across partitions. Labels that only occur in the test
/// partition are appended after the training labels.
pub fn run(config: &Configuration, layout: &DataLayout) -> Result<PreprocessingSummary> {
    let params = PreprocessingParams::from_config(config)?;
    let normalizer = TextNormalizer::english();

    let train = Table::read_csv(&layout.raw_train(), "load_raw")?;
    let test = Table::read_csv(&layout.raw_test(), "load_raw")?;
    tracing::debug!("Data loaded properly");
    let (train_rows_in, test_rows_in) = (train.len(), test.len());

    require_columns(&train, &params.text_column, &params.target_column)?;
    require_columns(&test, &params.text_column, &params.target_column)?;
    let train_target = train.require_column(&params.target_column, "preprocess")?;
    let test_target = test.require_column(&params.target_column, "preprocess")?;

    let mut labels = LabelMap::fit(train.column(train_target), params.label_order);
    let unseen = labels.extend(test.column(test_target));
    if !unseen.is_empty() {
        tracing::warn!("Test partition has labels absent from training, appended: {:?}", unseen);
    }
    tracing::debug!("Label map: {:?}", labels.labels());

    let train = preprocess_with_labels(train, &params.text_column, &params.target_column, &labels, &normalizer)?;
    let test = preprocess_with_labels(test, &params.text_column, &params.target_column, &labels, &normalizer)?;

    persist(&train, &test, layout)?;
    tracing::info!(
        "Preprocessing complete: train {} -> {} rows, test {} -> {} rows",
        train_rows_in,
        train.len(),
        test_rows_in,
        test.len()
    );

    Ok(PreprocessingSummary {
        train_rows_in,
        train_rows_out: train.len(),
        test_rows_in,
        test_rows_out: test.len(),
        labels,
    })
}
