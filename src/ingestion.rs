// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Ingestion stage: fetch, normalize columns, split, persist
//!
//! Produces `raw/train.csv` and `raw/test.csv` under the data root.

use crate::config::{Configuration, DataLayout};
use crate::error::{PipelineError, Result};
use crate::table::{self, Table};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

/// Public SMS spam collection used when no source is configured
pub const DEFAULT_SOURCE: &str = "https://raw.githubusercontent.com/vikashishere/Datasets/main/spam.csv";

const FETCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Which source columns become `target` and `text`, and which are dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub drop_columns: Vec<String>,
    pub target_source: String,
    pub text_source: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            drop_columns: vec!["Unnamed: 2".into(), "Unnamed: 3".into(), "Unnamed: 4".into()],
            target_source: "v1".into(),
            text_source: "v2".into(),
        }
    }
}

/// Ingestion parameters from the `data_ingestion` section
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionParams {
    pub test_size: f64,
    pub random_state: u64,
    pub source: String,
    pub columns: ColumnMapping,
}

impl IngestionParams {
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let defaults = ColumnMapping::default();
        let default_drops: Vec<&str> = defaults.drop_columns.iter().map(String::as_str).collect();
        Ok(Self {
            test_size: config.require_f64("data_ingestion.test_size")?,
            random_state: config.u64_or("data_ingestion.random_state", 2)?,
            source: config.str_or("data_ingestion.source", DEFAULT_SOURCE)?,
            columns: ColumnMapping {
                drop_columns: config.str_list_or("data_ingestion.drop_columns", &default_drops)?,
                target_source: config.str_or("data_ingestion.target_source", &defaults.target_source)?,
                text_source: config.str_or("data_ingestion.text_source", &defaults.text_source)?,
            },
        })
    }
}

fn read_source_bytes(source: &str) -> Result<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        tracing::debug!("Downloading from: {}", source);
        let response = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .and_then(|client| client.get(source).send())
            .map_err(|e| PipelineError::data_source("fetch_dataset", source, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PipelineError::data_source(
                "fetch_dataset",
                source,
                format!("download failed with status: {}", response.status()),
            ));
        }
        let body = response
            .bytes()
            .map_err(|e| PipelineError::data_source("fetch_dataset", source, format!("failed to read response: {}", e)))?;
        return Ok(body.to_vec());
    }

    let path = Path::new(source.strip_prefix("file://").unwrap_or(source));
    std::fs::read(path)
        .map_err(|e| PipelineError::data_source("fetch_dataset", source, format!("cannot read {}: {}", path.display(), e)))
}

/// Fetch the raw table from an `http(s)://` URL, a `file://` URI or a local path
pub fn fetch_dataset(source: &str) -> Result<Table> {
    let bytes = read_source_bytes(source)?;
    let digest = hex::encode(Sha256::digest(&bytes));
    tracing::debug!("Fetched {} bytes from {} (sha256 {})", bytes.len(), source, digest);

    let table = Table::parse_csv(&bytes).map_err(|detail| PipelineError::data_source("fetch_dataset", source, detail))?;
    tracing::debug!("Data loaded from {}: {} rows, columns {:?}", source, table.len(), table.columns());
    Ok(table)
}

/// Drop extraneous columns and rename the label and text columns.
///
/// Listed columns that are absent are skipped; an absent label or text source
/// column is a schema error.
pub fn normalize_columns(mut table: Table, mapping: &ColumnMapping) -> Result<Table> {
    table.require_column(&mapping.target_source, "normalize_columns")?;
    table.require_column(&mapping.text_source, "normalize_columns")?;

    let missing = table.drop_columns(&mapping.drop_columns);
    if !missing.is_empty() {
        tracing::debug!("Columns not present, nothing to drop: {:?}", missing);
    }
    table.rename_column(&mapping.target_source, "target", "normalize_columns")?;
    table.rename_column(&mapping.text_source, "text", "normalize_columns")?;
    tracing::debug!("Columns normalized: {:?}", table.columns());
    Ok(table)
}

/// Number of test rows for `n` rows at `test_fraction`.
///
/// Rounds up, with a small tolerance so that products like `0.3 * 10` which land
/// a hair above an integer are not bumped to the next one.
fn test_count(n: usize, test_fraction: f64) -> usize {
    ((test_fraction * n as f64) - 1e-9).ceil().max(0.0) as usize
}

/// Seeded random split into (train, test).
///
/// Both partitions are non-empty, disjoint, and together hold every input row.
pub fn split(table: &Table, test_fraction: f64, seed: u64) -> Result<(Table, Table)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::config(
            "split",
            format!("data_ingestion.test_size must be strictly between 0 and 1, got {}", test_fraction),
        ));
    }

    let n = table.len();
    let n_test = test_count(n, test_fraction);
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::config(
            "split",
            format!(
                "test_size {} over {} rows leaves an empty partition ({} test rows)",
                test_fraction, n, n_test
            ),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let (test_idx, train_idx) = order.split_at(n_test);
    tracing::debug!("Split {} rows into {} train / {} test (seed {})", n, train_idx.len(), n_test, seed);
    Ok((table.select_rows(train_idx), table.select_rows(test_idx)))
}

/// Write both raw partitions, all or nothing
pub fn persist(train: &Table, test: &Table, layout: &DataLayout) -> Result<()> {
    let dir = layout.raw_dir();
    table::persist_all(&dir, &[("train.csv", train), ("test.csv", test)], "persist_raw")?;
    tracing::debug!("Train and test data saved to {}", dir.display());
    Ok(())
}

/// Row counts of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    pub fetched_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Run the ingestion stage end to end
pub fn run(config: &Configuration, layout: &DataLayout) -> Result<IngestionSummary> {
    let params = IngestionParams::from_config(config)?;
    let raw = fetch_dataset(&params.source)?;
    let fetched_rows = raw.len();
    let table = normalize_columns(raw, &params.columns)?;
    let (train, test) = split(&table, params.test_size, params.random_state)?;
    persist(&train, &test, layout)?;

    tracing::info!(
        "Ingestion complete: {} rows -> {} train / {} test",
        fetched_rows,
        train.len(),
        test.len()
    );
    Ok(IngestionSummary {
        fetched_rows,
        train_rows: train.len(),
        test_rows: test.len(),
    })
}
