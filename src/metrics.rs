// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Binary classification metrics
//!
//! Implements the figures reported by the evaluation stage:
//! - Confusion Matrix
//! - Accuracy, Precision, Recall (positive class = 1)
//! - AUC-ROC over predicted probabilities

use serde::{Deserialize, Serialize};

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// True Positives
    pub tp: usize,
    /// True Negatives
    pub tn: usize,
    /// False Positives
    pub fp: usize,
    /// False Negatives
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Tally predictions against ground truth; both slices hold 0/1 labels
    pub fn from_predictions(predictions: &[u8], ground_truth: &[u8]) -> Self {
        let mut matrix = Self::default();

        for (pred, truth) in predictions.iter().zip(ground_truth.iter()) {
            match (*pred == 1, *truth == 1) {
                (true, true) => matrix.tp += 1,
                (false, false) => matrix.tn += 1,
                (true, false) => matrix.fp += 1,
                (false, true) => matrix.fn_ += 1,
            }
        }

        matrix
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.tp + self.tn) as f64 / total as f64
    }

    /// Precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = self.tp + self.fp;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    /// Recall (Sensitivity): TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denom = self.tp + self.fn_;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }
}

/// Area under the ROC curve by the trapezoidal rule.
///
/// Samples with equal probability are taken as one threshold step, so ties
/// contribute a diagonal segment. Returns `None` when either class is absent.
pub fn auc_roc(ground_truth: &[u8], probabilities: &[f64]) -> Option<f64> {
    // Sort by probability descending
    let mut pairs: Vec<(u8, f64)> = ground_truth
        .iter()
        .copied()
        .zip(probabilities.iter().copied())
        .collect();
    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let n_pos = pairs.iter().filter(|(l, _)| *l == 1).count() as f64;
    let n_neg = pairs.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return None;
    }

    let mut tpr_prev = 0.0;
    let mut fpr_prev = 0.0;
    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut auc = 0.0;

    let mut i = 0;
    while i < pairs.len() {
        let threshold = pairs[i].1;
        while i < pairs.len() && pairs[i].1 == threshold {
            if pairs[i].0 == 1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }

        let tpr = tp / n_pos;
        let fpr = fp / n_neg;
        auc += (fpr - fpr_prev) * (tpr + tpr_prev) / 2.0;
        tpr_prev = tpr;
        fpr_prev = fpr;
    }

    Some(auc)
}

/// Structured result of one evaluation run, persisted as flat JSON
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub auc: f64,
}

impl MetricsReport {
    /// Compute every metric; a single-class ground truth yields AUC 0.5
    pub fn compute(predictions: &[u8], probabilities: &[f64], ground_truth: &[u8]) -> Self {
        let cm = ConfusionMatrix::from_predictions(predictions, ground_truth);
        tracing::debug!(
            "Confusion matrix: tp={} tn={} fp={} fn={}",
            cm.tp,
            cm.tn,
            cm.fp,
            cm.fn_
        );

        let auc = auc_roc(ground_truth, probabilities).unwrap_or_else(|| {
            tracing::warn!("Only one class present in ground truth; AUC reported as 0.5");
            0.5
        });

        Self {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            auc,
        }
    }

    pub fn format(&self) -> String {
        format!(
            "accuracy={:.4} precision={:.4} recall={:.4} auc={:.4}",
            self.accuracy, self.precision, self.recall, self.auc
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_perfect() {
        let truth = [1, 0, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&truth, &truth);

        assert_eq!(cm.tp, 2);
        assert_eq!(cm.tn, 2);
        assert!((cm.accuracy() - 1.0).abs() < 1e-6);
        assert!((cm.precision() - 1.0).abs() < 1e-6);
        assert!((cm.recall() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_confusion_matrix_worst() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 0, 1], &[1, 0, 1, 0]);

        assert_eq!(cm.fp, 2);
        assert_eq!(cm.fn_, 2);
        assert!(cm.accuracy().abs() < 1e-6);
    }

    #[test]
    fn test_zero_denominators_report_zero() {
        // nothing predicted positive, nothing actually positive
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 0], &[0, 0, 0]);
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.recall(), 0.0);
        assert!((cm.accuracy() - 1.0).abs() < 1e-6);
        assert_eq!(ConfusionMatrix::default().accuracy(), 0.0);
    }

    #[test]
    fn test_auc_roc_perfect_and_inverted() {
        let truth = [1, 1, 0, 0];
        let auc = auc_roc(&truth, &[0.9, 0.8, 0.2, 0.1]).unwrap();
        assert!((auc - 1.0).abs() < 1e-6);
        let auc = auc_roc(&truth, &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!(auc.abs() < 1e-6);
    }

    #[test]
    fn test_auc_roc_partial_ranking() {
        let auc = auc_roc(&[1, 0, 1, 0], &[0.9, 0.8, 0.4, 0.3]).unwrap();
        assert!((auc - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_auc_roc_ties_are_grouped() {
        let auc = auc_roc(&[1, 0, 1, 0], &[0.5, 0.5, 0.5, 0.5]).unwrap();
        assert!((auc - 0.5).abs() < 1e-6);
        // the order of tied samples must not matter
        let a = auc_roc(&[1, 0, 0, 1], &[0.9, 0.6, 0.6, 0.6]).unwrap();
        let b = auc_roc(&[1, 1, 0, 0], &[0.9, 0.6, 0.6, 0.6]).unwrap();
        assert!((a - b).abs() < 1e-12);
        assert!((a - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_single_class_auc() {
        assert!(auc_roc(&[1, 1], &[0.2, 0.9]).is_none());
        let report = MetricsReport::compute(&[1, 1], &[0.2, 0.9], &[1, 1]);
        assert!((report.auc - 0.5).abs() < 1e-6);
        assert!((report.accuracy - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = MetricsReport::compute(&[1, 0], &[0.8, 0.3], &[1, 0]);
        let value = serde_json::to_value(report).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for key in ["accuracy", "precision", "recall", "auc"] {
            assert!(keys.contains(&key));
            assert!((value[key].as_f64().unwrap() - 1.0).abs() < 1e-6);
        }
        assert!(report.format().contains("auc=1.0000"));
    }
}
