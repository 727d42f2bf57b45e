//! Training matrix preparation and holdout split

use linfa::Dataset;
use ndarray::{Array1, Array2, Axis, Ix1};

use crate::data::aggregate::median;
use crate::data::features::{get_feature_names, FeatureRecord, NUM_FEATURES};
use crate::error::TrainError;

/// Feature matrix in canonical column order with win labels
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub feature_names: Vec<String>,
    /// One row per driver-race
    pub features: Array2<f64>,
    pub labels: Array1<bool>,
}

impl TrainingSet {
    /// Build X/y from the feature table
    ///
    /// Non-finite values are replaced with their column median. Both winners
    /// and non-winners must be present.
    pub fn from_feature_table(records: &[FeatureRecord]) -> Result<Self, TrainError> {
        if records.is_empty() {
            return Err(TrainError::EmptyDataset);
        }

        let mut features = Array2::from_shape_fn((records.len(), NUM_FEATURES), |(i, j)| {
            records[i].features.values()[j]
        });
        let labels: Array1<bool> = records.iter().map(|r| r.won).collect();

        let positives = labels.iter().filter(|&&won| won).count();
        if positives == 0 || positives == labels.len() {
            return Err(TrainError::SingleClass(labels.len()));
        }

        for mut column in features.columns_mut() {
            let fill = median(column.iter().map(|&v| Some(v).filter(|v| v.is_finite())))
                .unwrap_or(0.0);
            column.mapv_inplace(|v| if v.is_finite() { v } else { fill });
        }

        Ok(Self {
            feature_names: get_feature_names().into_iter().map(str::to_string).collect(),
            features,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// Number of winning rows
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&won| won).count()
    }

    /// Both winners and non-winners are present
    pub fn has_both_classes(&self) -> bool {
        let positives = self.positives();
        positives > 0 && positives < self.len()
    }

    /// linfa dataset over the features with labels mapped by `label`
    pub fn to_dataset<T, F>(&self, label: F) -> Dataset<f64, T, Ix1>
    where
        F: FnMut(bool) -> T,
    {
        Dataset::new(self.features.clone(), self.labels.mapv(label))
    }

    /// Deterministic stratified split into (train, test)
    ///
    /// Each class contributes `round(n * test_fraction)` evenly spaced rows to
    /// the test set; a class with at least two rows keeps at least one row on
    /// each side.
    pub fn stratified_split(&self, test_fraction: f64) -> (TrainingSet, TrainingSet) {
        let mut is_test = vec![false; self.len()];

        for class in [false, true] {
            let members: Vec<usize> = (0..self.len())
                .filter(|&i| self.labels[i] == class)
                .collect();
            let n = members.len();
            let n_test = if n >= 2 {
                ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1)
            } else {
                0
            };

            for (k, &i) in members.iter().enumerate() {
                // Marks exactly n_test rows spread across the class.
                if (k + 1) * n_test / n > k * n_test / n {
                    is_test[i] = true;
                }
            }
        }

        let pick = |test: bool| {
            let rows: Vec<usize> = (0..self.len()).filter(|&i| is_test[i] == test).collect();
            TrainingSet {
                feature_names: self.feature_names.clone(),
                features: self.features.select(Axis(0), &rows),
                labels: self.labels.select(Axis(0), &rows),
            }
        };

        (pick(false), pick(true))
    }
}
