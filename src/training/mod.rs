//! Model training
//!
//! Prepares the training matrix from the feature table, fits every enabled
//! strategy and keeps the best model by holdout AUC.

pub mod dataset;
pub mod metrics;
pub mod registry;
pub mod strategies;

use crate::classifier::NativeModel;
use crate::config::TrainingConfig;
use crate::data::features::FeatureRecord;
use crate::error::TrainError;

pub use dataset::TrainingSet;
pub use metrics::EvaluationMetrics;
pub use registry::{StrategyRegistry, StrategyStatus};
pub use strategies::{GaussianNbStrategy, LogisticRegressionStrategy, TrainingStrategy};

/// One fitted model with its holdout metrics
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub name: String,
    pub model: NativeModel,
    pub metrics: EvaluationMetrics,
}

/// Every fitted model plus which one is best
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Model input columns, in order
    pub feature_names: Vec<String>,
    pub models: Vec<TrainedModel>,
    /// Index into `models`
    pub best: usize,
}

impl TrainingOutcome {
    pub fn best_model(&self) -> &TrainedModel {
        &self.models[self.best]
    }
}

/// Train every configured strategy on the feature table
pub fn train_models(
    records: &[FeatureRecord],
    config: &TrainingConfig,
) -> Result<TrainingOutcome, TrainError> {
    let data = TrainingSet::from_feature_table(records)?;
    StrategyRegistry::from_config(config).train_all(&data, config.test_fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::csv_loader::RaceResultRecord;
    use crate::data::features::FeatureEngineering;

    #[test]
    fn test_train_models_from_history() {
        let mut history = Vec::new();
        for round in 1..=10u32 {
            for (slot, driver) in ["VER", "LEC", "NOR", "HAM", "ALO"].iter().enumerate() {
                // Finishing order follows the grid.
                let position = slot as f64 + 1.0;
                let track = format!("Track{}", round % 4);
                history.push(
                    RaceResultRecord::new(*driver, 2023, round, track, "Team")
                        .with_result(Some(position), Some(25.0 - 5.0 * slot as f64))
                        .with_qualifying(Some(position)),
                );
            }
        }

        let table = FeatureEngineering::create_ml_features(&history);
        let outcome = train_models(&table, &TrainingConfig::default()).unwrap();

        assert_eq!(outcome.models.len(), 2);
        assert_eq!(outcome.feature_names.len(), crate::data::features::NUM_FEATURES);
        let best = outcome.best_model();
        assert!(best.metrics.auc >= 0.5);
        assert!(outcome.models.iter().all(|m| m.metrics.auc <= best.metrics.auc));
    }
}
