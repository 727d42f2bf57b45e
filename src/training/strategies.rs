//! Training strategies
//!
//! Each strategy fits one linfa estimator on a training set and stores its
//! fitted parameters as a native model.

use linfa::prelude::*;
use linfa_bayes::GaussianNb;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, Axis};
use std::fmt;
use tracing::info;

use crate::classifier::{GaussianNbModel, LogisticModel, NativeModel, WIN_CLASS};
use crate::config::TrainingConfig;
use crate::error::TrainError;
use crate::training::dataset::TrainingSet;

/// A named way of fitting a win classifier
pub trait TrainingStrategy: Send + Sync {
    /// Model name used in metadata and file names
    fn name(&self) -> &'static str;

    /// Whether this strategy can run in the current build
    fn is_available(&self) -> bool {
        true
    }

    fn fit(&self, train: &TrainingSet) -> Result<NativeModel, TrainError>;
}

fn strategy_error<E: fmt::Display>(name: &str, e: E) -> TrainError {
    TrainError::Strategy {
        name: name.to_string(),
        reason: e.to_string(),
    }
}

fn check_trainable(train: &TrainingSet) -> Result<(), TrainError> {
    if train.is_empty() {
        return Err(TrainError::EmptyDataset);
    }
    if !train.has_both_classes() {
        return Err(TrainError::SingleClass(train.len()));
    }
    Ok(())
}

/// Per-column mean and population standard deviation (1.0 for constant columns)
fn column_moments(features: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let means = features
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(features.ncols()));
    let scales = features
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s < 1e-12 { 1.0 } else { s });
    (means, scales)
}

/// L2-regularized logistic regression over standardized inputs
pub struct LogisticRegressionStrategy {
    pub max_iterations: u64,
    pub l2_penalty: f64,
}

impl LogisticRegressionStrategy {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            l2_penalty: config.l2_penalty,
        }
    }
}

impl TrainingStrategy for LogisticRegressionStrategy {
    fn name(&self) -> &'static str {
        "LogisticRegression"
    }

    fn fit(&self, train: &TrainingSet) -> Result<NativeModel, TrainError> {
        check_trainable(train)?;

        let (means, scales) = column_moments(&train.features);
        let standardized = (&train.features - &means) / &scales;
        let dataset = Dataset::new(standardized, train.labels.clone());

        let fitted = LogisticRegression::default()
            .alpha(self.l2_penalty)
            .max_iterations(self.max_iterations)
            .fit(&dataset)
            .map_err(|e| strategy_error(self.name(), e))?;

        // linfa picks its own positive class; flip the coefficients so they
        // score P(win). The most confident row tells which class that is.
        let probabilities = fitted.predict_probabilities(dataset.records());
        let predicted = fitted.predict(dataset.records());
        let sign = probabilities
            .iter()
            .zip(predicted.iter())
            .max_by(|a, b| (a.0 - 0.5).abs().total_cmp(&(b.0 - 0.5).abs()))
            .map(|(&p, &won)| if (p >= 0.5) == won { 1.0 } else { -1.0 })
            .unwrap_or(1.0);

        let weights: Vec<f64> = fitted.params().iter().map(|w| sign * w).collect();
        let intercept = sign * fitted.intercept();
        if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(strategy_error(self.name(), "optimizer produced non-finite weights"));
        }

        info!("Fitted {} over {} rows", self.name(), train.len());
        Ok(NativeModel::LogisticRegression(LogisticModel {
            means: means.to_vec(),
            scales: scales.to_vec(),
            weights,
            intercept,
        }))
    }
}

/// Gaussian naive Bayes
pub struct GaussianNbStrategy {
    /// Fraction of the largest feature variance added to every variance
    pub var_smoothing: f64,
}

impl Default for GaussianNbStrategy {
    fn default() -> Self {
        Self {
            var_smoothing: 1e-9,
        }
    }
}

impl TrainingStrategy for GaussianNbStrategy {
    fn name(&self) -> &'static str {
        "GaussianNB"
    }

    fn fit(&self, train: &TrainingSet) -> Result<NativeModel, TrainError> {
        check_trainable(train)?;

        let dataset = train.to_dataset(|won| if won { WIN_CLASS } else { 0 });
        let model = GaussianNb::params()
            .var_smoothing(self.var_smoothing)
            .fit(&dataset)
            .map_err(|e| strategy_error(self.name(), e))?;

        info!("Fitted {} over {} rows", self.name(), train.len());
        Ok(NativeModel::GaussianNb(GaussianNbModel {
            n_features: train.num_features(),
            model,
        }))
    }
}
