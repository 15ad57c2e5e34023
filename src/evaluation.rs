// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation stage: score the processed test partition with a trained model
//!
//! Feature and label columns are selected by name through a [`FeatureSchema`],
//! never by position.

use crate::config::{Configuration, DataLayout};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureSchema, SCHEMA_FILE};
use crate::metrics::MetricsReport;
use crate::model::{self, Classifier};
use crate::table::Table;
use std::path::{Path, PathBuf};

/// Numeric features and binary labels of one partition
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledFeatures {
    pub schema: FeatureSchema,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

fn parse_label(value: &str, row: usize) -> Result<u8> {
    match value.trim() {
        "0" | "0.0" => Ok(0),
        "1" | "1.0" => Ok(1),
        other => Err(PipelineError::evaluation(
            "load_processed_dataset",
            format!("row {}: label '{}' is not 0 or 1", row, other),
        )),
    }
}

fn parse_feature(value: &str, row: usize, column: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|_| {
        PipelineError::evaluation(
            "load_processed_dataset",
            format!("row {}: feature '{}' has non-numeric value '{}'", row, column, value),
        )
    })
}

/// Pick the schema columns out of a loaded table
pub fn select_features(table: &Table, schema: FeatureSchema) -> Result<LabelledFeatures> {
    let label_idx = table.require_column(&schema.label, "load_processed_dataset")?;
    let feature_idx = schema
        .features
        .iter()
        .map(|name| table.require_column(name, "load_processed_dataset"))
        .collect::<Result<Vec<_>>>()?;

    let mut features = Vec::with_capacity(table.len());
    let mut labels = Vec::with_capacity(table.len());
    for (row_no, row) in table.rows().iter().enumerate() {
        let values = feature_idx
            .iter()
            .zip(&schema.features)
            .map(|(&i, name)| parse_feature(&row[i], row_no, name))
            .collect::<Result<Vec<_>>>()?;
        features.push(values);
        labels.push(parse_label(&row[label_idx], row_no)?);
    }

    Ok(LabelledFeatures {
        schema,
        features,
        labels,
    })
}

/// Load a numeric dataset together with its feature schema.
///
/// The schema comes from `feature_schema.json` beside the file when present,
/// otherwise the `label` column is the label and every other column a feature.
pub fn load_processed_dataset(path: &Path) -> Result<LabelledFeatures> {
    let table = Table::read_csv(path, "load_processed_dataset")?;
    let schema_path = path.parent().unwrap_or(Path::new(".")).join(SCHEMA_FILE);
    let schema = if schema_path.exists() {
        FeatureSchema::load(&schema_path)?
    } else {
        tracing::debug!("No feature schema at {}, inferring from header", schema_path.display());
        FeatureSchema::infer(table.columns())
    };
    let dataset = select_features(&table, schema)?;
    tracing::debug!(
        "Test data loaded: {} rows, {} features",
        dataset.labels.len(),
        dataset.schema.features.len()
    );
    Ok(dataset)
}

/// Score every row and compute the metrics report
pub fn evaluate<M: Classifier + ?Sized>(model: &M, features: &[Vec<f64>], labels: &[u8]) -> Result<MetricsReport> {
    if features.is_empty() {
        return Err(PipelineError::evaluation("evaluate", "no rows to evaluate"));
    }
    if features.len() != labels.len() {
        return Err(PipelineError::evaluation(
            "evaluate",
            format!("{} feature rows but {} labels", features.len(), labels.len()),
        ));
    }
    if let Some(bad) = labels.iter().find(|&&l| l > 1) {
        return Err(PipelineError::evaluation("evaluate", format!("label {} is not 0 or 1", bad)));
    }

    let mut predictions = Vec::with_capacity(features.len());
    let mut probabilities = Vec::with_capacity(features.len());
    for (row_no, row) in features.iter().enumerate() {
        if let Some(width) = model.expected_features() {
            if row.len() != width {
                return Err(PipelineError::evaluation(
                    "evaluate",
                    format!("row {} has {} features, model expects {}", row_no, row.len(), width),
                ));
            }
        }
        let probability = model.predict_probability(row);
        if !(0.0..=1.0).contains(&probability) {
            return Err(PipelineError::evaluation(
                "evaluate",
                format!("row {}: model returned probability {}", row_no, probability),
            ));
        }
        predictions.push(model.predict(row));
        probabilities.push(probability);
    }

    let report = MetricsReport::compute(&predictions, &probabilities, labels);
    tracing::debug!("Model evaluation metrics calculated: {}", report.format());
    Ok(report)
}

/// Write the report as JSON, replacing any earlier report
pub fn persist(report: &MetricsReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io("persist_metrics", parent, e))?;
    }
    let json = serde_json::to_string_pretty(report).map_err(|e| {
        PipelineError::io("persist_metrics", path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    std::fs::write(path, json).map_err(|e| PipelineError::io("persist_metrics", path, e))?;
    tracing::debug!("Metrics saved to {}", path.display());
    Ok(())
}

/// Evaluation parameters from the `model_evaluation` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationParams {
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
}

impl EvaluationParams {
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            model_path: config.str_or("model_evaluation.model_path", "models/model.json")?.into(),
            metrics_path: config.str_or("model_evaluation.metrics_path", "reports/metrics.json")?.into(),
        })
    }
}

/// Run the evaluation stage end to end
pub fn run(config: &Configuration, layout: &DataLayout) -> Result<MetricsReport> {
    let params = EvaluationParams::from_config(config)?;
    let model = model::load_model(&params.model_path)?;
    let dataset = load_processed_dataset(&layout.features_test())?;
    let report = evaluate(&model, &dataset.features, &dataset.labels)?;
    persist(&report, &params.metrics_path)?;
    tracing::info!("Evaluation complete: {}", report.format());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::LogisticRegression;

    /// Echoes the first feature as its probability
    struct Oracle;

    impl Classifier for Oracle {
        fn predict(&self, features: &[f64]) -> u8 {
            u8::from(features[0] >= 0.5)
        }

        fn predict_probability(&self, features: &[f64]) -> f64 {
            features[0]
        }
    }

    #[test]
    fn test_perfect_classifier() {
        let features = vec![vec![0.9], vec![0.1], vec![0.8], vec![0.2]];
        let report = evaluate(&Oracle, &features, &[1, 0, 1, 0]).unwrap();
        assert!((report.accuracy - 1.0).abs() < 1e-6);
        assert!((report.precision - 1.0).abs() < 1e-6);
        assert!((report.recall - 1.0).abs() < 1e-6);
        assert!((report.auc - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_evaluate_rejects_bad_input() {
        let err = evaluate(&Oracle, &[], &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluation);

        let err = evaluate(&Oracle, &[vec![0.5], vec![0.5]], &[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluation);

        let err = evaluate(&Oracle, &[vec![0.5]], &[2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluation);

        let err = evaluate(&Oracle, &[vec![1.5]], &[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluation);
    }

    #[test]
    fn test_evaluate_checks_model_width() {
        let model = LogisticRegression {
            weights: vec![1.0, 1.0],
            intercept: 0.0,
            threshold: 0.5,
        };
        let err = evaluate(&model, &[vec![1.0, 0.0, 0.0]], &[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluation);
        assert!(evaluate(&model, &[vec![1.0, 0.0]], &[1]).is_ok());
    }

    #[test]
    fn test_columns_selected_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_tfidf.csv");
        // label first, and an extra column the schema does not mention
        std::fs::write(&path, "label,note,f_b,f_a\n1,x,0.5,0.25\n0,y,0,1\n").unwrap();
        FeatureSchema {
            features: vec!["f_a".into(), "f_b".into()],
            label: "label".into(),
        }
        .save(&dir.path().join(SCHEMA_FILE))
        .unwrap();

        let dataset = load_processed_dataset(&path).unwrap();
        assert_eq!(dataset.features, vec![vec![0.25, 0.5], vec![1.0, 0.0]]);
        assert_eq!(dataset.labels, vec![1, 0]);
    }

    #[test]
    fn test_schema_inferred_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.csv");
        std::fs::write(&path, "f1,label,f2\n0.1,1,0.2\n").unwrap();
        let dataset = load_processed_dataset(&path).unwrap();
        assert_eq!(dataset.schema.features, vec!["f1".to_string(), "f2".to_string()]);
        assert_eq!(dataset.features, vec![vec![0.1, 0.2]]);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.csv");

        std::fs::write(&path, "f1,target\n0.1,1\n").unwrap();
        assert_eq!(load_processed_dataset(&path).unwrap_err().kind(), ErrorKind::Schema);

        std::fs::write(&path, "f1,label\n0.1,spam\n").unwrap();
        assert_eq!(load_processed_dataset(&path).unwrap_err().kind(), ErrorKind::Evaluation);

        std::fs::write(&path, "f1,label\nabc,1\n").unwrap();
        assert_eq!(load_processed_dataset(&path).unwrap_err().kind(), ErrorKind::Evaluation);

        let missing = dir.path().join("none.csv");
        assert_eq!(load_processed_dataset(&missing).unwrap_err().kind(), ErrorKind::Io);
    }

    #[test]
    fn test_persist_overwrites_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("metrics.json");
        let first = MetricsReport {
            accuracy: 0.5,
            precision: 0.5,
            recall: 0.5,
            auc: 0.5,
        };
        persist(&first, &path).unwrap();
        let second = MetricsReport { accuracy: 1.0, ..first };
        persist(&second, &path).unwrap();

        let written: MetricsReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, second);
    }

    #[test]
    fn test_run_reports_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::from_yaml_str(&format!(
            "model_evaluation:\n  model_path: \"{}\"\n",
            dir.path().join("absent.json").display()
        ))
        .unwrap();
        let err = run(&config, &DataLayout::new(dir.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelLoad);
    }
}
