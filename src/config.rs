// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Stage configuration loaded from a YAML parameter file
//!
//! Keys are addressed by dotted path (`data_ingestion.test_size`). Unknown keys
//! are ignored so stage sections can grow independently. Each stage loads its
//! own `Configuration`; nothing is cached between invocations.

use crate::error::{PipelineError, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Default parameter file name, relative to the working directory
pub const DEFAULT_PARAMS_FILE: &str = "params.yaml";

/// Immutable view over a parsed parameter file
#[derive(Debug, Clone)]
pub struct Configuration {
    root: Value,
    origin: String,
}

impl Configuration {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config("load_config", format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::parse(&raw, &path.display().to_string())?;
        tracing::debug!("Parameters retrieved from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Self::parse(raw, "<inline>")
    }

    fn parse(raw: &str, origin: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(raw).map_err(|e| {
            PipelineError::config("load_config", format!("malformed YAML in {}: {}", origin, e))
        })?;
        let root = match root {
            Value::Null => Value::Mapping(Default::default()),
            Value::Mapping(_) => root,
            _ => {
                return Err(PipelineError::config(
                    "load_config",
                    format!("{} must contain a key-value mapping at the top level", origin),
                ))
            }
        };
        Ok(Self {
            root,
            origin: origin.to_string(),
        })
    }

    /// Look up a dotted key path
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.').try_fold(&self.root, |node, segment| node.get(segment))
    }

    fn wrong_type(&self, key: &str, expected: &str) -> PipelineError {
        PipelineError::config(
            "read_config",
            format!("key '{}' in {} must be {}", key, self.origin, expected),
        )
    }

    /// Required floating point value
    pub fn require_f64(&self, key: &str) -> Result<f64> {
        let value = self.get(key).ok_or_else(|| {
            PipelineError::config(
                "read_config",
                format!("missing required key '{}' in {}", key, self.origin),
            )
        })?;
        value.as_f64().ok_or_else(|| self.wrong_type(key, "a number"))
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| self.wrong_type(key, "a non-negative integer")),
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize> {
        let value = self.u64_or(key, default as u64)?;
        usize::try_from(value).map_err(|_| self.wrong_type(key, "an integer that fits in usize"))
    }

    pub fn str_or(&self, key: &str, default: &str) -> Result<String> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(self.wrong_type(key, "a string")),
        }
    }

    pub fn str_list_or(&self, key: &str, default: &[&str]) -> Result<Vec<String>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default.iter().map(|s| s.to_string()).collect()),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(self.wrong_type(key, "a list of strings")),
                })
                .collect(),
            Some(_) => Err(self.wrong_type(key, "a list of strings")),
        }
    }
}

/// Fixed on-disk layout of persisted stage outputs under a data root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the data root from `pipeline.data_root`, defaulting to `data`
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self::new(config.str_or("pipeline.data_root", "data")?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn raw_train(&self) -> PathBuf {
        self.raw_dir().join("train.csv")
    }

    pub fn raw_test(&self) -> PathBuf {
        self.raw_dir().join("test.csv")
    }

    pub fn interim_dir(&self) -> PathBuf {
        self.root.join("interim")
    }

    pub fn interim_train(&self) -> PathBuf {
        self.interim_dir().join("train_processed.csv")
    }

    pub fn interim_test(&self) -> PathBuf {
        self.interim_dir().join("test_processed.csv")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn features_train(&self) -> PathBuf {
        self.processed_dir().join("train_tfidf.csv")
    }

    pub fn features_test(&self) -> PathBuf {
        self.processed_dir().join("test_tfidf.csv")
    }

    pub fn feature_schema(&self) -> PathBuf {
        self.processed_dir().join(crate::features::SCHEMA_FILE)
    }
}
