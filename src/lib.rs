//! F1 Predict - Formula 1 race-winner prediction
//!
//! This library provides:
//! - Feature engineering over historical race results (rolling form, track
//!   record, constructor strength, qualifying impact, season standing)
//! - Feature synthesis for future races from assumptions and history
//! - Training and storage of win classifiers
//! - Ranked win-probability predictions for a race or a season
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use f1predict::predictor::RacePredictor;
//!
//! let predictor = RacePredictor::load("models", "data/historical_data.csv").unwrap();
//! let drivers = vec!["VER".to_string(), "LEC".to_string()];
//! let quali: HashMap<String, u32> = [("VER".to_string(), 1)].into_iter().collect();
//!
//! for p in predictor.predict_race(&drivers, "Monaco", &quali, None).unwrap() {
//!     println!("{}: {:.2}%", p.driver, p.win_probability);
//! }
//! ```

pub mod assumptions;
pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod predictor;
pub mod store;
pub mod synthesizer;
pub mod training;

// Re-export commonly used types
pub use assumptions::Assumptions;
pub use classifier::{NativeModel, WinClassifier};
pub use data::{
    FeatureEngineering, FeatureName, FeatureRow, FeatureSchema, HistoricalData, HistoryIndex,
};
pub use error::{LoadError, PredictError, TrainError};
pub use models::{PredictionResult, RaceRequest};
pub use predictor::RacePredictor;
pub use store::{ModelBundle, ModelMetadata, ModelStore};
pub use synthesizer::{FeatureSource, FutureRaceSynthesizer, Provenance};
