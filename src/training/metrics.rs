//! Evaluation Metrics
//!
//! Holdout accuracy and ROC-AUC for a trained win classifier.

use ndarray::{ArrayView1, Zip};
use serde::{Deserialize, Serialize};

/// Probability at or above which a row is predicted as a win
const DECISION_THRESHOLD: f64 = 0.5;

/// Holdout evaluation of one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub auc: f64,
}

/// Calculate metrics from predicted win probabilities and true labels
///
/// AUC is 0.5 when the holdout contains a single class.
pub fn evaluate(probabilities: ArrayView1<f64>, labels: ArrayView1<bool>) -> EvaluationMetrics {
    EvaluationMetrics {
        accuracy: accuracy(probabilities, labels),
        auc: roc_auc(probabilities, labels).unwrap_or(0.5),
    }
}

/// Share of rows whose thresholded prediction matches the label
pub fn accuracy(probabilities: ArrayView1<f64>, labels: ArrayView1<bool>) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = Zip::from(probabilities)
        .and(labels)
        .fold(0usize, |acc, &p, &won| {
            acc + usize::from((p >= DECISION_THRESHOLD) == won)
        });
    correct as f64 / labels.len() as f64
}

/// Area under the ROC curve via the rank-sum statistic (ties get average ranks)
///
/// Returns `None` unless both classes are present.
pub fn roc_auc(probabilities: ArrayView1<f64>, labels: ArrayView1<bool>) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&won| won).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut ranks = vec![0.0; labels.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && probabilities[order[end]] == probabilities[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; tied block [start, end) shares the mean rank.
        let avg_rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = avg_rank;
        }
        start = end;
    }

    let pos_rank_sum: f64 = (0..labels.len())
        .filter(|&i| labels[i])
        .map(|i| ranks[i])
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}
