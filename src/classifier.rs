//! Win classifiers
//!
//! A classifier maps one model-ordered feature vector to P(win). Native
//! models are the fitted parameters of linfa estimators serialized as JSON;
//! an exported ONNX classifier can be served instead with the `onnx` feature.

use linfa_bayes::{GaussianNb, NaiveBayes};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::PredictError;

/// Binary win classifier over a model-ordered feature vector
pub trait WinClassifier: Send + Sync {
    /// Probability that the driver wins, for one input row
    fn predict_probability(&self, features: &[f64]) -> Result<f64, PredictError>;

    /// Number of input features the classifier expects
    fn num_features(&self) -> usize;
}

fn check_len(expected: usize, features: &[f64]) -> Result<(), PredictError> {
    if features.len() != expected {
        return Err(PredictError::Inference(format!(
            "expected {} features, got {}",
            expected,
            features.len()
        )));
    }
    Ok(())
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Logistic regression over standardized inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    /// Raw logit before the sigmoid
    pub fn logit(&self, features: &[f64]) -> f64 {
        features
            .iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.weights)
            .map(|(((x, mean), scale), w)| w * (x - mean) / scale)
            .sum::<f64>()
            + self.intercept
    }
}

impl WinClassifier for LogisticModel {
    fn predict_probability(&self, features: &[f64]) -> Result<f64, PredictError> {
        check_len(self.weights.len(), features)?;
        Ok(sigmoid(self.logit(features)))
    }

    fn num_features(&self) -> usize {
        self.weights.len()
    }
}

/// Label linfa uses for the winning class
pub const WIN_CLASS: usize = 1;

/// Gaussian naive Bayes fitted by linfa
///
/// Classes are `0` (did not win) and [`WIN_CLASS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNbModel {
    pub n_features: usize,
    pub model: GaussianNb<f64, usize>,
}

impl WinClassifier for GaussianNbModel {
    fn predict_probability(&self, features: &[f64]) -> Result<f64, PredictError> {
        check_len(self.n_features, features)?;
        let row = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| PredictError::Inference(e.to_string()))?;

        // Softmax over the joint log-likelihoods, shifted by their maximum so
        // rows far from every class do not underflow.
        let likelihoods = self.model.joint_log_likelihood(row.view());
        let mut win = None;
        let mut max = f64::NEG_INFINITY;
        for (class, values) in &likelihoods {
            if **class == WIN_CLASS {
                win = Some(values[0]);
            }
            max = max.max(values[0]);
        }
        let win =
            win.ok_or_else(|| PredictError::Inference("model has no win class".to_string()))?;

        let total: f64 = likelihoods.values().map(|values| (values[0] - max).exp()).sum();
        let probability = (win - max).exp() / total;
        if !probability.is_finite() {
            return Err(PredictError::Inference("non-finite naive Bayes likelihood".to_string()));
        }
        Ok(probability)
    }

    fn num_features(&self) -> usize {
        self.n_features
    }
}

/// Any model this crate can train, keyed by kind in its JSON file
///
/// Externally tagged: the naive Bayes class map has integer keys, which
/// internally tagged enums cannot read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NativeModel {
    LogisticRegression(LogisticModel),
    #[serde(rename = "GaussianNB")]
    GaussianNb(GaussianNbModel),
}

impl WinClassifier for NativeModel {
    fn predict_probability(&self, features: &[f64]) -> Result<f64, PredictError> {
        match self {
            NativeModel::LogisticRegression(model) => model.predict_probability(features),
            NativeModel::GaussianNb(model) => model.predict_probability(features),
        }
    }

    fn num_features(&self) -> usize {
        match self {
            NativeModel::LogisticRegression(model) => model.num_features(),
            NativeModel::GaussianNb(model) => model.num_features(),
        }
    }
}

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxClassifier;

#[cfg(feature = "onnx")]
mod onnx {
    use ort::{
        session::{builder::GraphOptimizationLevel, Session},
        value::Tensor,
    };
    use std::fmt;
    use std::path::Path;
    use std::sync::Mutex;
    use tracing::info;

    use super::{check_len, WinClassifier};
    use crate::error::{LoadError, PredictError};

    /// ONNX binary classifier exported with a probability output
    ///
    /// Output 0 holds predicted labels, output 1 holds `[n, 2]` class
    /// probabilities; column 1 is P(win).
    pub struct OnnxClassifier {
        session: Mutex<Session>,
        n_features: usize,
    }

    impl OnnxClassifier {
        pub fn load<P: AsRef<Path>>(path: P, n_features: usize) -> Result<Self, LoadError> {
            info!("Loading model: {:?}", path.as_ref());
            let session = Session::builder()
                .map_err(onnx_error)?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(onnx_error)?
                .commit_from_file(path.as_ref())
                .map_err(onnx_error)?;

            Ok(Self {
                session: Mutex::new(session),
                n_features,
            })
        }
    }

    fn onnx_error<E: fmt::Display>(e: E) -> LoadError {
        LoadError::Onnx(e.to_string())
    }

    fn inference_error<E: fmt::Display>(e: E) -> PredictError {
        PredictError::Inference(e.to_string())
    }

    impl WinClassifier for OnnxClassifier {
        fn predict_probability(&self, features: &[f64]) -> Result<f64, PredictError> {
            check_len(self.n_features, features)?;
            let input_vec: Vec<f32> = features.iter().map(|&x| x as f32).collect();
            let input_tensor = Tensor::from_array(([1usize, self.n_features], input_vec))
                .map_err(inference_error)?;

            let mut session = self
                .session
                .lock()
                .map_err(|e| PredictError::Inference(format!("Failed to lock session: {}", e)))?;
            let outputs = session.run(ort::inputs![input_tensor]).map_err(inference_error)?;

            if outputs.len() < 2 {
                return Err(PredictError::Inference(
                    "Expected at least 2 outputs from model".to_string(),
                ));
            }
            let (_, probs) = outputs[1].try_extract_tensor::<f32>().map_err(inference_error)?;
            probs
                .get(1)
                .map(|&p| p as f64)
                .ok_or_else(|| PredictError::Inference("missing win-class probability".to_string()))
        }

        fn num_features(&self) -> usize {
            self.n_features
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linfa::prelude::*;
    use ndarray::array;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_logistic_standardizes_inputs() {
        let model = LogisticModel {
            means: vec![10.0, 0.0],
            scales: vec![5.0, 1.0],
            weights: vec![-1.0, 0.0],
            intercept: 0.0,
        };

        assert!((model.predict_probability(&[10.0, 3.0]).unwrap() - 0.5).abs() < 1e-12);
        // One standard deviation below the mean grid slot.
        assert!((model.predict_probability(&[5.0, 3.0]).unwrap() - sigmoid(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_feature_length_mismatch() {
        let model = LogisticModel {
            means: vec![0.0; 3],
            scales: vec![1.0; 3],
            weights: vec![0.1; 3],
            intercept: 0.0,
        };
        let err = model.predict_probability(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, PredictError::Inference(_)));
    }

    fn fitted_nb() -> GaussianNbModel {
        let x = array![[1.0], [2.0], [1.5], [9.0], [10.0], [11.0]];
        let y = array![1usize, 1, 1, 0, 0, 0];
        let model = GaussianNb::params().fit(&Dataset::new(x, y)).unwrap();
        GaussianNbModel {
            n_features: 1,
            model,
        }
    }

    #[test]
    fn test_gaussian_nb_prefers_closer_class() {
        let model = fitted_nb();

        assert!(model.predict_probability(&[1.5]).unwrap() > 0.9);
        assert!(model.predict_probability(&[10.0]).unwrap() < 0.1);
        assert!(model.predict_probability(&[2.0, 1.0]).is_err());

        // Both likelihoods underflow this far out; the ratio must survive.
        let far = model.predict_probability(&[1.0e6]).unwrap();
        assert!(far.is_finite() && far < 0.01);
    }

    #[test]
    fn test_native_model_json_is_tagged() {
        let model = NativeModel::GaussianNb(fitted_nb());

        let json = serde_json::to_value(&model).unwrap();
        assert!(json.get("GaussianNB").is_some());

        let back: NativeModel = serde_json::from_value(json).unwrap();
        assert_eq!(back.num_features(), 1);
        let before = model.predict_probability(&[3.0]).unwrap();
        let after = back.predict_probability(&[3.0]).unwrap();
        assert!((before - after).abs() < 1e-12);
    }
}
