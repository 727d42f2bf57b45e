use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised while assembling a predictor (model artifacts, history, schema).
///
/// These are construction-time failures: the caller has to train a model or fix
/// its files before retrying, so they are kept apart from per-request errors.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Invalid feature schema: {0}")]
    InvalidSchema(String),

    #[error("Failed to read historical data: {0}")]
    Data(#[from] PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ONNX runtime error: {0}")]
    Onnx(String),
}

/// Errors raised by a single race prediction call.
///
/// A race is predicted all-or-nothing: any of these aborts the whole call.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Malformed assumptions for {scope}: {reason}")]
    MalformedAssumptions { scope: String, reason: String },

    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PredictError {
    pub fn malformed(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        PredictError::MalformedAssumptions {
            scope: scope.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the training pipeline
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("No training rows available")]
    EmptyDataset,

    #[error("Training labels contain a single class ({0} rows); need both winners and non-winners")]
    SingleClass(usize),

    #[error("Strategy {name} failed: {reason}")]
    Strategy { name: String, reason: String },

    #[error("No training strategy produced a model")]
    NoStrategies,
}

#[cfg(feature = "api")]
pub use self::http::*;

#[cfg(feature = "api")]
mod http {
    use actix_web::{http::StatusCode, HttpResponse, ResponseError};
    use std::fmt;

    use super::PredictError;
    use crate::models::ErrorResponse;

    /// Application error types
    #[derive(Debug)]
    pub enum AppError {
        /// Invalid request data
        ValidationError(String),
        /// Predictor could not be built (model not trained yet)
        ModelUnavailable(String),
        /// Model or prediction error
        PredictionError(String),
        /// Internal server error
        InternalError(String),
    }

    impl fmt::Display for AppError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
                AppError::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
                AppError::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
                AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            }
        }
    }

    impl std::error::Error for AppError {}

    impl From<PredictError> for AppError {
        fn from(err: PredictError) -> Self {
            match err {
                PredictError::MalformedAssumptions { .. } => {
                    AppError::ValidationError(err.to_string())
                }
                PredictError::Inference(_) => AppError::PredictionError(err.to_string()),
            }
        }
    }

    impl ResponseError for AppError {
        fn status_code(&self) -> StatusCode {
            match self {
                AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
                AppError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AppError::PredictionError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }

        fn error_response(&self) -> HttpResponse {
            let (error_code, message) = match self {
                AppError::ValidationError(msg) => ("validation_error", msg.clone()),
                AppError::ModelUnavailable(msg) => ("model_unavailable", msg.clone()),
                AppError::PredictionError(msg) => ("prediction_error", msg.clone()),
                AppError::InternalError(msg) => ("internal_error", msg.clone()),
            };

            HttpResponse::build(self.status_code()).json(ErrorResponse {
                error: error_code.to_string(),
                message,
            })
        }
    }

    /// Validation functions
    pub fn validate_drivers(drivers: &[String]) -> Result<(), AppError> {
        if drivers.is_empty() {
            return Err(AppError::ValidationError(
                "At least one driver is required".to_string(),
            ));
        }
        if let Some(pos) = drivers.iter().position(|d| d.trim().is_empty()) {
            return Err(AppError::ValidationError(format!(
                "Driver identifier at index {} is empty",
                pos
            )));
        }
        Ok(())
    }

    pub fn validate_track(track: &str) -> Result<(), AppError> {
        if track.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Track name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

}
