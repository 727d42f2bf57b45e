//! User assumptions for a hypothetical race
//!
//! Per-driver overrides are keyed by driver abbreviation; weather, lap times
//! and pit stops apply to every driver in the call. A per-driver entry that
//! omits a field takes the entry-level default for that field, which is not
//! the same value the synthesizer uses when no entry exists at all.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PredictError;

/// Recent form over the last five races
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverForm {
    pub points_last_5: f64,
    pub avg_position: f64,
    pub wins_last_5: f64,
}

impl Default for DriverForm {
    fn default() -> Self {
        Self {
            points_last_5: 50.0,
            avg_position: 5.0,
            wins_last_5: 1.0,
        }
    }
}

/// Strength of the driver's constructor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructorStrength {
    pub avg_points: f64,
    pub rank: f64,
}

impl Default for ConstructorStrength {
    fn default() -> Self {
        Self {
            avg_points: 15.0,
            rank: 5.0,
        }
    }
}

/// Championship standing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonStats {
    pub championship_rank: f64,
    pub points_per_race: f64,
}

impl Default for SeasonStats {
    fn default() -> Self {
        Self {
            championship_rank: 5.0,
            points_per_race: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weather {
    pub temperature: f64,
    pub humidity: f64,
    pub rain: bool,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            temperature: 25.0,
            humidity: 60.0,
            rain: false,
        }
    }
}

/// Lap times in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapTimes {
    pub avg: f64,
    pub best: f64,
}

impl Default for LapTimes {
    fn default() -> Self {
        Self {
            avg: 90.0,
            best: 85.0,
        }
    }
}

/// Overrides for one prediction call; unknown keys are ignored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    pub driver_form: HashMap<String, DriverForm>,
    pub constructor_strength: HashMap<String, ConstructorStrength>,
    pub season_stats: HashMap<String, SeasonStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lap_times: Option<LapTimes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pit_stops: Option<f64>,
}

impl Assumptions {
    /// Parse assumptions from a JSON value (request body or file)
    pub fn from_json(value: serde_json::Value) -> Result<Self, PredictError> {
        serde_json::from_value(value)
            .map_err(|e| PredictError::malformed("assumptions", e.to_string()))
    }

    /// Check that every value the synthesizer will read for `driver` is finite
    pub fn validate_for(&self, driver: &str) -> Result<(), PredictError> {
        if let Some(form) = self.driver_form.get(driver) {
            check_finite(driver, "driver_form.points_last_5", form.points_last_5)?;
            check_finite(driver, "driver_form.avg_position", form.avg_position)?;
            check_finite(driver, "driver_form.wins_last_5", form.wins_last_5)?;
        }
        if let Some(team) = self.constructor_strength.get(driver) {
            check_finite(driver, "constructor_strength.avg_points", team.avg_points)?;
            check_finite(driver, "constructor_strength.rank", team.rank)?;
        }
        if let Some(season) = self.season_stats.get(driver) {
            check_finite(driver, "season_stats.championship_rank", season.championship_rank)?;
            check_finite(driver, "season_stats.points_per_race", season.points_per_race)?;
        }
        if let Some(weather) = &self.weather {
            check_finite("weather", "temperature", weather.temperature)?;
            check_finite("weather", "humidity", weather.humidity)?;
        }
        if let Some(laps) = &self.lap_times {
            check_finite("lap_times", "avg", laps.avg)?;
            check_finite("lap_times", "best", laps.best)?;
        }
        if let Some(pits) = self.pit_stops {
            check_finite("pit_stops", "pit_stops", pits)?;
        }
        Ok(())
    }
}

fn check_finite(scope: &str, field: &str, value: f64) -> Result<(), PredictError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PredictError::malformed(
            scope,
            format!("{} must be a finite number, got {}", field, value),
        ))
    }
}
