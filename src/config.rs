//! Configuration for the predictor, trainer and API server.

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Historical results CSV written by the collector
    #[serde(default = "default_data_path")]
    pub data: String,
    /// Directory holding model files and metadata
    #[serde(default = "default_model_dir")]
    pub models: String,
}

fn default_data_path() -> String {
    "data/historical_data.csv".to_string()
}

fn default_model_dir() -> String {
    "models".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data: default_data_path(),
            models: default_model_dir(),
        }
    }
}

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Strategies to run; an empty list runs every registered strategy
    #[serde(default)]
    pub strategies: Vec<String>,
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Optimizer iteration cap for logistic regression
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    /// L2 regularization strength for logistic regression
    #[serde(default = "default_l2_penalty")]
    pub l2_penalty: f64,
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_l2_penalty() -> f64 {
    1.0
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
            test_fraction: default_test_fraction(),
            max_iterations: default_max_iterations(),
            l2_penalty: default_l2_penalty(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub training: TrainingConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("f1predict").required(false))
            // Override with environment variables (F1PREDICT_SERVER__PORT, ...)
            .add_source(
                config::Environment::with_prefix("F1PREDICT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("training.strategies"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
