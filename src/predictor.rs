//! Race prediction
//!
//! Combines the future-race synthesizer with a loaded model to rank the
//! drivers of one race by win probability.

use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::assumptions::Assumptions;
use crate::data::csv_loader::HistoricalData;
use crate::data::history::HistoryIndex;
use crate::error::{LoadError, PredictError};
use crate::models::{PredictionResult, RaceRequest};
use crate::store::{ModelBundle, ModelStore};
use crate::synthesizer::{FutureRaceSynthesizer, SynthesizedRow};

/// Grid slot assumed for a driver missing from the qualifying map
pub const DEFAULT_QUALIFYING_POSITION: u32 = 10;

/// Predicts race winners from a trained model and historical results
pub struct RacePredictor {
    bundle: ModelBundle,
    history: HistoryIndex,
}

impl RacePredictor {
    pub fn new(bundle: ModelBundle, history: HistoryIndex) -> Self {
        Self { bundle, history }
    }

    /// Load the model from `model_dir` and history from `data_path`
    ///
    /// A missing model is an error; missing history only disables the
    /// historical fallbacks.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        model_dir: P,
        data_path: Q,
    ) -> Result<Self, LoadError> {
        let bundle = ModelStore::new(model_dir).load()?;
        let history = HistoryIndex::new(HistoricalData::load_or_empty(data_path)?.into_records());
        info!(
            "Predictor ready: model {}, {} historical results",
            bundle.model_name(),
            history.len()
        );
        Ok(Self::new(bundle, history))
    }

    pub fn model_name(&self) -> &str {
        self.bundle.model_name()
    }

    pub fn history(&self) -> &HistoryIndex {
        &self.history
    }

    /// Feature row for one driver, before projection onto the model schema
    pub fn create_future_race_features(
        &self,
        driver: &str,
        track: &str,
        qualifying_position: u32,
        assumptions: &Assumptions,
    ) -> Result<SynthesizedRow, PredictError> {
        FutureRaceSynthesizer::new(&self.history).synthesize(
            driver,
            track,
            qualifying_position,
            assumptions,
        )
    }

    /// Win probability in [0, 1] for one driver
    fn win_probability(
        &self,
        driver: &str,
        track: &str,
        qualifying_position: u32,
        assumptions: &Assumptions,
    ) -> Result<f64, PredictError> {
        let synthesized =
            self.create_future_race_features(driver, track, qualifying_position, assumptions)?;
        let input = synthesized.row.project(&self.bundle.schema);

        let probability = self.bundle.classifier.predict_probability(&input)?;
        if !probability.is_finite() {
            return Err(PredictError::Inference(format!(
                "classifier returned {} for {}",
                probability, driver
            )));
        }
        Ok(probability.clamp(0.0, 1.0))
    }

    /// Predict win probabilities for every driver in one race
    ///
    /// Returns one result per input driver (duplicates included), sorted by
    /// descending probability with ties kept in input order. Probabilities
    /// are percentages and are independent per driver, so they need not sum
    /// to 100. Any failure fails the whole race.
    pub fn predict_race(
        &self,
        drivers: &[String],
        track: &str,
        qualifying_positions: &HashMap<String, u32>,
        assumptions: Option<&Assumptions>,
    ) -> Result<Vec<PredictionResult>, PredictError> {
        let empty = Assumptions::default();
        let assumptions = assumptions.unwrap_or(&empty);

        let mut predictions = drivers
            .iter()
            .map(|driver| {
                let qualifying_position = qualifying_positions
                    .get(driver)
                    .copied()
                    .unwrap_or(DEFAULT_QUALIFYING_POSITION);
                let probability =
                    self.win_probability(driver, track, qualifying_position, assumptions)?;
                Ok(PredictionResult {
                    driver: driver.clone(),
                    track: track.to_string(),
                    qualifying_position,
                    win_probability: probability,
                })
            })
            .collect::<Result<Vec<_>, PredictError>>()?;

        // Stable, so equal probabilities keep driver order.
        predictions.sort_by(|a, b| b.win_probability.total_cmp(&a.win_probability));
        for prediction in &mut predictions {
            prediction.win_probability *= 100.0;
        }

        Ok(predictions)
    }

    /// Predict several races with one shared set of assumptions
    ///
    /// Each race is ranked on its own; results are concatenated in race order.
    pub fn predict_season(
        &self,
        races: &[RaceRequest],
        assumptions: Option<&Assumptions>,
    ) -> Result<Vec<PredictionResult>, PredictError> {
        let mut all = Vec::new();
        for race in races {
            all.extend(self.predict_race(
                &race.drivers,
                &race.track,
                &race.qualifying_positions,
                assumptions,
            )?);
        }
        Ok(all)
    }
}
