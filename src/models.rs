use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One race to predict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceRequest {
    pub track: String,
    pub drivers: Vec<String>,
    /// driver -> expected qualifying position; absent drivers start 10th
    #[serde(default)]
    pub qualifying_positions: HashMap<String, u32>,
}

/// Race prediction request
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(flatten)]
    pub race: RaceRequest,
    /// Raw assumptions object, parsed per call
    #[serde(default)]
    pub assumptions: Option<serde_json::Value>,
}

/// Win probability for one driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub driver: String,
    pub track: String,
    pub qualifying_position: u32,
    /// Percentage in [0, 100]
    pub win_probability: f64,
}

/// Race prediction response
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<PredictionResult>,
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
