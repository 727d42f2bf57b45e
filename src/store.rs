//! Model storage
//!
//! A model directory holds `model_metadata.json`, the best model as
//! `<name>_best.json` (or `<name>_best.onnx` with the `onnx` feature) and
//! every trained model as `<name>.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::classifier::{NativeModel, WinClassifier};
use crate::data::features::FeatureSchema;
use crate::error::LoadError;
use crate::training::TrainingOutcome;

pub const METADATA_FILE: &str = "model_metadata.json";

/// Summary of the best model and the input columns it expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub best_model: String,
    pub best_auc: f64,
    pub best_accuracy: f64,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub trained_at: Option<String>,
}

/// A loaded classifier with the schema its inputs must follow
pub struct ModelBundle {
    pub classifier: Box<dyn WinClassifier>,
    pub schema: FeatureSchema,
    pub metadata: ModelMetadata,
}

impl ModelBundle {
    /// Bundle a classifier whose input length must match the schema
    pub fn new(
        classifier: Box<dyn WinClassifier>,
        metadata: ModelMetadata,
    ) -> Result<Self, LoadError> {
        let schema = FeatureSchema::new(metadata.feature_names.clone())?;
        if classifier.num_features() != schema.len() {
            return Err(LoadError::InvalidSchema(format!(
                "model takes {} features but metadata lists {}",
                classifier.num_features(),
                schema.len()
            )));
        }
        Ok(Self {
            classifier,
            schema,
            metadata,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.metadata.best_model
    }
}

/// Reads and writes a model directory
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn model_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn best_path(&self, name: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}_best.{}", name, extension))
    }

    /// Save every trained model, the best one and the metadata
    pub fn save(&self, outcome: &TrainingOutcome) -> io::Result<ModelMetadata> {
        fs::create_dir_all(&self.dir)?;

        let best = outcome.best_model();
        write_json(&self.best_path(&best.name, "json"), &best.model)?;
        for trained in &outcome.models {
            write_json(&self.model_path(&trained.name), &trained.model)?;
        }

        let metadata = ModelMetadata {
            best_model: best.name.clone(),
            best_auc: best.metrics.auc,
            best_accuracy: best.metrics.accuracy,
            feature_names: outcome.feature_names.clone(),
            trained_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        write_json(&self.dir.join(METADATA_FILE), &metadata)?;

        info!("Models saved to {:?}", self.dir);
        Ok(metadata)
    }

    pub fn load_metadata(&self) -> Result<ModelMetadata, LoadError> {
        let path = self.dir.join(METADATA_FILE);
        if !path.exists() {
            return Err(LoadError::MissingDependency(format!(
                "{:?} not found; train a model first",
                path
            )));
        }
        Ok(serde_json::from_str(&fs::read_to_string(&path)?)?)
    }

    /// Load the best model and its schema
    pub fn load(&self) -> Result<ModelBundle, LoadError> {
        let metadata = self.load_metadata()?;
        let classifier = self.load_classifier(&metadata)?;
        let bundle = ModelBundle::new(classifier, metadata)?;
        info!(
            "Loaded model {} ({} features)",
            bundle.model_name(),
            bundle.schema.len()
        );
        Ok(bundle)
    }

    fn load_classifier(
        &self,
        metadata: &ModelMetadata,
    ) -> Result<Box<dyn WinClassifier>, LoadError> {
        let json_path = self.best_path(&metadata.best_model, "json");
        if json_path.exists() {
            let model: NativeModel = serde_json::from_str(&fs::read_to_string(&json_path)?)?;
            return Ok(Box::new(model));
        }

        #[cfg(feature = "onnx")]
        {
            let onnx_path = self.best_path(&metadata.best_model, "onnx");
            if onnx_path.exists() {
                let model = crate::classifier::OnnxClassifier::load(
                    &onnx_path,
                    metadata.feature_names.len(),
                )?;
                return Ok(Box::new(model));
            }
        }

        Err(LoadError::MissingDependency(format!(
            "model file for {} not found in {:?}",
            metadata.best_model, self.dir
        )))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)
}
