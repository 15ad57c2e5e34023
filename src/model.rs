// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Serialized classifier artifacts
//!
//! Training happens elsewhere; this module only loads the JSON artifact it
//! produces and scores feature rows with it. The document is tagged by `kind`:
//!
//! ```json
//! {"kind": "logistic_regression", "weights": [0.4, -1.2], "intercept": 0.1}
//! ```

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A trained binary classifier over dense feature rows
pub trait Classifier {
    /// Predicted class, 0 or 1
    fn predict(&self, features: &[f64]) -> u8;

    /// Probability of the positive class
    fn predict_probability(&self, features: &[f64]) -> f64;

    /// Feature width the model was trained on, if it knows it
    fn expected_features(&self) -> Option<usize> {
        None
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn default_threshold() -> f64 {
    0.5
}

/// Linear model with a logistic link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Classifier for LogisticRegression {
    fn predict(&self, features: &[f64]) -> u8 {
        u8::from(self.predict_probability(features) >= self.threshold)
    }

    fn predict_probability(&self, features: &[f64]) -> f64 {
        sigmoid(dot(&self.weights, features) + self.intercept)
    }

    fn expected_features(&self) -> Option<usize> {
        Some(self.weights.len())
    }
}

/// Multinomial naive Bayes with per-class log priors and feature log probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultinomialNaiveBayes {
    pub class_log_prior: [f64; 2],
    pub feature_log_prob: [Vec<f64>; 2],
}

impl MultinomialNaiveBayes {
    fn joint_log_likelihood(&self, features: &[f64]) -> [f64; 2] {
        [
            self.class_log_prior[0] + dot(&self.feature_log_prob[0], features),
            self.class_log_prior[1] + dot(&self.feature_log_prob[1], features),
        ]
    }
}

impl Classifier for MultinomialNaiveBayes {
    fn predict(&self, features: &[f64]) -> u8 {
        let [neg, pos] = self.joint_log_likelihood(features);
        u8::from(pos > neg)
    }

    fn predict_probability(&self, features: &[f64]) -> f64 {
        let [neg, pos] = self.joint_log_likelihood(features);
        sigmoid(pos - neg)
    }

    fn expected_features(&self) -> Option<usize> {
        Some(self.feature_log_prob[1].len())
    }
}

/// Any supported artifact, as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    LogisticRegression(LogisticRegression),
    MultinomialNaiveBayes(MultinomialNaiveBayes),
}

impl ModelArtifact {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::LogisticRegression(_) => "logistic_regression",
            ModelArtifact::MultinomialNaiveBayes(_) => "multinomial_naive_bayes",
        }
    }

    /// Reject artifacts that parse but cannot score anything sensibly
    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            ModelArtifact::LogisticRegression(m) => {
                if m.weights.is_empty() {
                    return Err("logistic regression has no weights".into());
                }
                if !m.weights.iter().chain([&m.intercept]).all(|w| w.is_finite()) {
                    return Err("logistic regression has non-finite coefficients".into());
                }
                if !(0.0..=1.0).contains(&m.threshold) {
                    return Err(format!("threshold {} is outside [0, 1]", m.threshold));
                }
            }
            ModelArtifact::MultinomialNaiveBayes(m) => {
                let [neg, pos] = &m.feature_log_prob;
                if neg.is_empty() || neg.len() != pos.len() {
                    return Err(format!(
                        "feature_log_prob rows must be non-empty and equal length, got {} and {}",
                        neg.len(),
                        pos.len()
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Classifier for ModelArtifact {
    fn predict(&self, features: &[f64]) -> u8 {
        match self {
            ModelArtifact::LogisticRegression(m) => m.predict(features),
            ModelArtifact::MultinomialNaiveBayes(m) => m.predict(features),
        }
    }

    fn predict_probability(&self, features: &[f64]) -> f64 {
        match self {
            ModelArtifact::LogisticRegression(m) => m.predict_probability(features),
            ModelArtifact::MultinomialNaiveBayes(m) => m.predict_probability(features),
        }
    }

    fn expected_features(&self) -> Option<usize> {
        match self {
            ModelArtifact::LogisticRegression(m) => m.expected_features(),
            ModelArtifact::MultinomialNaiveBayes(m) => m.expected_features(),
        }
    }
}

/// Load a model artifact; any failure is a model load error naming the path
pub fn load_model(path: &Path) -> Result<ModelArtifact> {
    let raw = std::fs::read_to_string(path).map_err(|e| PipelineError::model_load(path, e.to_string()))?;
    let model: ModelArtifact =
        serde_json::from_str(&raw).map_err(|e| PipelineError::model_load(path, format!("invalid artifact: {}", e)))?;
    model.validate().map_err(|detail| PipelineError::model_load(path, detail))?;

    tracing::debug!(
        "Model loaded from {} ({}, {:?} features)",
        path.display(),
        model.kind(),
        model.expected_features()
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn write(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("model.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_logistic_regression_scores() {
        let model = LogisticRegression {
            weights: vec![2.0, -2.0],
            intercept: 0.0,
            threshold: 0.5,
        };
        assert!((model.predict_probability(&[0.0, 0.0]) - 0.5).abs() < 1e-12);
        assert_eq!(model.predict(&[1.0, 0.0]), 1);
        assert_eq!(model.predict(&[0.0, 1.0]), 0);
        assert!(model.predict_probability(&[-400.0, 400.0]) >= 0.0);
    }

    #[test]
    fn test_naive_bayes_scores() {
        let model = MultinomialNaiveBayes {
            class_log_prior: [0.5f64.ln(), 0.5f64.ln()],
            feature_log_prob: [vec![0.8f64.ln(), 0.2f64.ln()], vec![0.2f64.ln(), 0.8f64.ln()]],
        };
        assert_eq!(model.predict(&[0.0, 1.0]), 1);
        assert_eq!(model.predict(&[1.0, 0.0]), 0);
        let p = model.predict_probability(&[0.0, 1.0]);
        assert!((p - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_load_tagged_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"kind": "logistic_regression", "weights": [1.0, 2.0, 3.0], "intercept": -1.0}"#);
        let model = load_model(&path).unwrap();
        assert_eq!(model.kind(), "logistic_regression");
        assert_eq!(model.expected_features(), Some(3));
        match model {
            ModelArtifact::LogisticRegression(m) => assert!((m.threshold - 0.5).abs() < 1e-12),
            other => panic!("unexpected artifact {:?}", other),
        }

        let path = write(
            &dir,
            r#"{"kind": "multinomial_naive_bayes", "class_log_prior": [-0.7, -0.7],
                "feature_log_prob": [[-1.0, -0.5], [-0.5, -1.0]]}"#,
        );
        assert_eq!(load_model(&path).unwrap().expected_features(), Some(2));
    }

    #[test]
    fn test_load_failures_are_model_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_model(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelLoad);

        for body in [
            "not json",
            r#"{"kind": "random_forest", "trees": []}"#,
            r#"{"kind": "logistic_regression", "weights": [], "intercept": 0.0}"#,
            r#"{"kind": "logistic_regression", "weights": [1.0], "intercept": 0.0, "threshold": 2.0}"#,
            r#"{"kind": "multinomial_naive_bayes", "class_log_prior": [0.0, 0.0], "feature_log_prob": [[1.0], [1.0, 2.0]]}"#,
        ] {
            let path = write(&dir, body);
            let err = load_model(&path).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ModelLoad, "artifact {}", body);
            assert!(format!("{}", err).contains("model.json"));
        }
    }
}
