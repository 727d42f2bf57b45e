//! Strategy registry
//!
//! Holds the named training strategies, lets each be switched on or off, and
//! picks the best fitted model by holdout AUC.

use ndarray::Array1;
use tracing::{info, warn};

use crate::classifier::WinClassifier;
use crate::config::TrainingConfig;
use crate::error::TrainError;
use crate::training::dataset::TrainingSet;
use crate::training::metrics::evaluate;
use crate::training::strategies::{
    GaussianNbStrategy, LogisticRegressionStrategy, TrainingStrategy,
};
use crate::training::{TrainedModel, TrainingOutcome};

struct Entry {
    strategy: Box<dyn TrainingStrategy>,
    enabled: bool,
}

/// Availability of one registered strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyStatus {
    pub name: &'static str,
    pub available: bool,
    pub enabled: bool,
}

#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<Entry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in strategy, enabled per `config.strategies` (all when empty)
    pub fn from_config(config: &TrainingConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(LogisticRegressionStrategy::from_config(config)));
        registry.register(Box::new(GaussianNbStrategy::default()));

        if !config.strategies.is_empty() {
            for status in registry.statuses() {
                let enabled = config.strategies.iter().any(|s| s == status.name);
                registry.set_enabled(status.name, enabled);
            }
            for unknown in config
                .strategies
                .iter()
                .filter(|s| !registry.entries.iter().any(|e| e.strategy.name() == s.as_str()))
            {
                warn!("Unknown training strategy {:?} ignored", unknown);
            }
        }
        registry
    }

    /// Add a strategy, enabled; replaces any strategy with the same name
    pub fn register(&mut self, strategy: Box<dyn TrainingStrategy>) {
        self.entries.retain(|e| e.strategy.name() != strategy.name());
        self.entries.push(Entry {
            strategy,
            enabled: true,
        });
    }

    /// Returns false if no strategy has this name
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.strategy.name() == name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn statuses(&self) -> Vec<StrategyStatus> {
        self.entries
            .iter()
            .map(|e| StrategyStatus {
                name: e.strategy.name(),
                available: e.strategy.is_available(),
                enabled: e.enabled,
            })
            .collect()
    }

    /// Names of strategies that are both enabled and available
    pub fn available(&self) -> Vec<&'static str> {
        self.runnable().map(|s| s.name()).collect()
    }

    fn runnable(&self) -> impl Iterator<Item = &dyn TrainingStrategy> {
        self.entries
            .iter()
            .filter(|e| e.enabled && e.strategy.is_available())
            .map(|e| e.strategy.as_ref())
    }

    /// Fit every runnable strategy on the training split and score it on the holdout
    ///
    /// A strategy that fails is logged and skipped. The best model is the one
    /// with the highest AUC; the earliest registered wins ties.
    pub fn train_all(
        &self,
        data: &TrainingSet,
        test_fraction: f64,
    ) -> Result<TrainingOutcome, TrainError> {
        let (train, test) = data.stratified_split(test_fraction);
        info!(
            "Training on {} rows ({} wins), evaluating on {} rows",
            train.len(),
            train.positives(),
            test.len()
        );

        let mut models: Vec<TrainedModel> = Vec::new();
        for strategy in self.runnable() {
            let model = match strategy.fit(&train) {
                Ok(model) => model,
                Err(e) => {
                    warn!("{} training failed: {}", strategy.name(), e);
                    continue;
                }
            };

            let probabilities: Result<Array1<f64>, _> = test
                .features
                .rows()
                .into_iter()
                .map(|row| model.predict_probability(&row.to_vec()))
                .collect();
            let probabilities = match probabilities {
                Ok(p) => p,
                Err(e) => {
                    warn!("{} evaluation failed: {}", strategy.name(), e);
                    continue;
                }
            };

            let metrics = evaluate(probabilities.view(), test.labels.view());
            info!(
                "{}: accuracy {:.3}, ROC-AUC {:.3}",
                strategy.name(),
                metrics.accuracy,
                metrics.auc
            );
            models.push(TrainedModel {
                name: strategy.name().to_string(),
                model,
                metrics,
            });
        }

        let mut best = 0;
        for (i, candidate) in models.iter().enumerate().skip(1) {
            if candidate.metrics.auc > models[best].metrics.auc {
                best = i;
            }
        }
        if models.is_empty() {
            return Err(TrainError::NoStrategies);
        }

        info!("Best model: {} (AUC: {:.3})", models[best].name, models[best].metrics.auc);
        Ok(TrainingOutcome {
            feature_names: data.feature_names.clone(),
            models,
            best,
        })
    }
}
