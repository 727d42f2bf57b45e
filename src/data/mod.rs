//! Data loading, history lookup and feature engineering modules

pub mod aggregate;
pub mod catalog;
pub mod csv_loader;
pub mod features;
pub mod history;

// Re-export commonly used types
pub use csv_loader::{HistoricalData, RaceResultRecord};
pub use features::{
    get_feature_names, write_feature_table, FeatureEngineering, FeatureName, FeatureRecord,
    FeatureRow, FeatureSchema, NUM_FEATURES,
};
pub use history::{FallbackReason, HistoryIndex, TrackRecord};
